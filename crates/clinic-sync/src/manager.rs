//! Connection-manager actor.
//!
//! One tokio task owns the [`RetrySession`] and folds every input through
//! [`machine::step`]: connector status changes, network changes, auth changes,
//! a periodic tick, attempt outcomes, and commands from the handle. Scheduled
//! attempts are spawned tasks tracked in an [`AttemptSet`]. An attempt is
//! cancellable until its delay elapses; once it has called `connect()` it runs
//! to completion and its outcome is discarded if the session changed meanwhile.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use clinic_core::{AuthUser, ConnectionStatus};

use crate::connector::SyncConnector;
use crate::error::SyncError;
use crate::machine::{
    self, Action, ConnectionState, Event, ManualRetry, Observation, RetryPolicy, RetrySession,
};
use crate::network::NetworkSignal;
use crate::session::SessionSource;

/// Everything observable about the manager at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSnapshot {
    pub state: ConnectionState,
    pub session: RetrySession,
    pub status: ConnectionStatus,
    pub online: bool,
    pub authenticated: bool,
    /// Attempts scheduled but not yet finished.
    pub pending_attempts: usize,
}

impl ManagerSnapshot {
    fn initial(status: ConnectionStatus, online: bool) -> Self {
        let session = RetrySession::new();
        Self {
            state: ConnectionState::derive(&status, &session),
            session,
            status,
            online,
            authenticated: false,
            pending_attempts: 0,
        }
    }
}

enum Command {
    Auth(Option<AuthUser>),
    RetryNow(oneshot::Sender<ManualRetry>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Connected,
    Failed,
    /// `connect()` returned but the status is not connected.
    Inconclusive,
}

struct AttemptResult {
    id: u64,
    generation: u64,
    outcome: Outcome,
}

struct AttemptGuard(JoinHandle<()>);

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Default)]
struct AttemptSet {
    next_id: u64,
    /// Waiting out their delay. Dropping the guard aborts the timer.
    scheduled: BTreeMap<u64, AttemptGuard>,
    /// Inside `connect()`. Only teardown aborts these.
    in_flight: BTreeMap<u64, AttemptGuard>,
}

impl AttemptSet {
    /// Move `id` from scheduled to in flight. `false` if it was cancelled.
    fn fire(&mut self, id: u64) -> bool {
        match self.scheduled.remove(&id) {
            Some(guard) => {
                self.in_flight.insert(id, guard);
                true
            }
            None => false,
        }
    }

    fn cancel_scheduled(&mut self) -> usize {
        let cancelled = self.scheduled.len();
        self.scheduled.clear();
        cancelled
    }

    fn clear(&mut self) {
        self.scheduled.clear();
        self.in_flight.clear();
    }

    fn len(&self) -> usize {
        self.scheduled.len() + self.in_flight.len()
    }
}

type SharedAttempts = Arc<Mutex<AttemptSet>>;

fn lock(attempts: &SharedAttempts) -> std::sync::MutexGuard<'_, AttemptSet> {
    attempts.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the connection-manager actor.
///
/// Dropping the handle tears the manager down: scheduled and running attempts
/// are aborted immediately and the actor exits.
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<ManagerSnapshot>,
    attempts: SharedAttempts,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Start the actor on the current tokio runtime.
    #[must_use]
    pub fn spawn(
        policy: RetryPolicy,
        connector: Arc<dyn SyncConnector>,
        session: Arc<dyn SessionSource>,
        network: &NetworkSignal,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let status_rx = connector.status();
        let network_rx = network.subscribe();
        let initial = ManagerSnapshot::initial(*status_rx.borrow(), *network_rx.borrow());
        let (snapshot_tx, snapshot) = watch::channel(initial);
        let attempts = SharedAttempts::default();

        let auth_tx = commands.clone();
        let subscription = session.watch_auth(Box::new(move |user| {
            let _ = auth_tx.send(Command::Auth(user.cloned()));
        }));

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let actor = Actor {
            policy,
            connector,
            session,
            status_rx,
            network_rx,
            snapshot_tx,
            attempts: Arc::clone(&attempts),
            outcome_tx,
            health: None,
            generation: 0,
            retry: RetrySession::new(),
            status: initial.status,
            online: initial.online,
            authenticated: false,
        };
        let task = tokio::spawn(async move {
            // Held for the actor's lifetime; dropping it unregisters the listener.
            let _subscription = subscription;
            actor.run(command_rx, outcome_rx).await;
        });

        Self {
            commands,
            snapshot,
            attempts,
            task: Some(task),
        }
    }

    /// Latest snapshot.
    #[must_use]
    pub fn current(&self) -> ManagerSnapshot {
        *self.snapshot.borrow()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn snapshot(&self) -> watch::Receiver<ManagerSnapshot> {
        self.snapshot.clone()
    }

    /// User-invoked "retry now". Skips the cooldown and given-up gate but
    /// still counts against the attempt bound.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::ManagerStopped` if the actor has exited.
    pub async fn retry_now(&self) -> Result<ManualRetry, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::RetryNow(reply))
            .map_err(|_| SyncError::ManagerStopped)?;
        rx.await.map_err(|_| SyncError::ManagerStopped)
    }

    /// Stop the actor and cancel every scheduled attempt.
    pub async fn shutdown(mut self) {
        lock(&self.attempts).clear();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take()
            && let Err(error) = task.await
            && !error.is_cancelled()
        {
            tracing::warn!(%error, "connection manager task failed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        lock(&self.attempts).clear();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Actor {
    policy: RetryPolicy,
    connector: Arc<dyn SyncConnector>,
    session: Arc<dyn SessionSource>,
    status_rx: watch::Receiver<ConnectionStatus>,
    network_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<ManagerSnapshot>,
    attempts: SharedAttempts,
    outcome_tx: mpsc::UnboundedSender<AttemptResult>,
    health: Option<AttemptGuard>,
    /// Bumped at every session boundary; outcomes from older sessions are ignored.
    generation: u64,
    retry: RetrySession,
    status: ConnectionStatus,
    online: bool,
    authenticated: bool,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<AttemptResult>,
    ) {
        match self.session.current_user().await {
            Ok(user) => self.authenticated = user.is_some(),
            Err(error) => {
                tracing::warn!(%error, "could not resolve current user; starting signed out");
            }
        }
        tracing::debug!(
            authenticated = self.authenticated,
            online = self.online,
            "connection manager started"
        );

        let mut ticker = tokio::time::interval(self.policy.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status_open = true;
        let mut network_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Auth(user)) => self.on_auth(user).await,
                    Some(Command::RetryNow(reply)) => {
                        let outcome = self.on_retry_now();
                        let _ = reply.send(outcome);
                    }
                    Some(Command::Shutdown) | None => break,
                },
                changed = self.status_rx.changed(), if status_open => {
                    if changed.is_err() {
                        status_open = false;
                        continue;
                    }
                    self.status = *self.status_rx.borrow_and_update();
                    tracing::debug!(
                        connected = self.status.connected,
                        connecting = self.status.connecting,
                        "connection status changed"
                    );
                    self.observe();
                }
                changed = self.network_rx.changed(), if network_open => {
                    if changed.is_err() {
                        network_open = false;
                        continue;
                    }
                    self.online = *self.network_rx.borrow_and_update();
                    self.observe();
                }
                _ = ticker.tick() => self.on_tick(),
                Some(result) = outcomes.recv() => self.on_outcome(result),
            }
        }

        lock(&self.attempts).clear();
        self.health = None;
        tracing::debug!("connection manager stopped");
    }

    fn observation(&self) -> Observation {
        Observation {
            status: self.status,
            online: self.online,
            authenticated: self.authenticated,
        }
    }

    fn apply(&mut self, event: Event) {
        let step = machine::step(&self.policy, self.retry, event, Instant::now());
        if step.session.given_up && !self.retry.given_up {
            tracing::info!(
                attempts = step.session.attempt_count,
                "retry bound reached; working offline until next sign-in"
            );
        }
        self.retry = step.session;
        if let Some(Action::ScheduleAttempt { delay }) = step.action {
            tracing::debug!(
                attempt = self.retry.attempt_count,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "scheduling connection attempt"
            );
            self.schedule(delay);
        }
        self.publish();
    }

    fn observe(&mut self) {
        self.apply(Event::Observed(self.observation()));
    }

    async fn on_auth(&mut self, user: Option<AuthUser>) {
        self.authenticated = user.is_some();
        self.generation += 1;
        // New session: nothing scheduled for the previous one may fire.
        let cancelled = lock(&self.attempts).cancel_scheduled();
        if cancelled > 0 {
            tracing::debug!(cancelled, "cancelled scheduled attempts from previous session");
        }
        match &user {
            Some(user) => tracing::info!(user_id = %user.id, "session started; retry state reset"),
            None => {
                tracing::info!("session ended; retry state reset");
                if let Err(error) = self.connector.disconnect().await {
                    tracing::warn!(%error, "disconnect on sign-out failed");
                }
            }
        }
        self.apply(Event::SessionBoundary);
        self.observe();
    }

    fn on_retry_now(&mut self) -> ManualRetry {
        let (session, outcome) =
            machine::retry_now(&self.policy, self.retry, self.observation(), Instant::now());
        self.retry = session;
        tracing::info!(?outcome, attempt = self.retry.attempt_count, "manual retry");
        if outcome == ManualRetry::Started {
            self.schedule(Duration::ZERO);
        }
        self.publish();
        outcome
    }

    /// Periodic re-evaluation, plus a health sync while connected so a lost
    /// connection surfaces as a status change.
    fn on_tick(&mut self) {
        self.observe();
        if !self.status.connected || self.health.as_ref().is_some_and(|h| !h.0.is_finished()) {
            return;
        }
        let connector = Arc::clone(&self.connector);
        let handle = tokio::spawn(async move {
            if let Err(error) = connector.health_check().await {
                tracing::warn!(%error, "sync health check failed");
            }
        });
        self.health = Some(AttemptGuard(handle));
    }

    fn on_outcome(&mut self, result: AttemptResult) {
        let AttemptResult {
            id,
            generation,
            outcome,
        } = result;
        lock(&self.attempts).in_flight.remove(&id);
        if generation != self.generation {
            tracing::debug!(?outcome, "discarding outcome of attempt from previous session");
            self.publish();
            return;
        }
        match outcome {
            Outcome::Connected => {
                tracing::info!("connection attempt succeeded");
                self.apply(Event::AttemptSucceeded);
            }
            Outcome::Failed => self.apply(Event::AttemptFailed),
            Outcome::Inconclusive => self.publish(),
        }
    }

    fn schedule(&self, delay: Duration) {
        let connector = Arc::clone(&self.connector);
        let session = Arc::clone(&self.session);
        let status = self.status_rx.clone();
        let outcomes = self.outcome_tx.clone();
        let shared = Arc::clone(&self.attempts);
        let generation = self.generation;

        let mut attempts = lock(&self.attempts);
        let id = attempts.next_id;
        attempts.next_id += 1;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !lock(&shared).fire(id) {
                return;
            }
            let outcome = attempt(connector.as_ref(), session.as_ref(), &status).await;
            let _ = outcomes.send(AttemptResult {
                id,
                generation,
                outcome,
            });
        });
        attempts.scheduled.insert(id, AttemptGuard(handle));
    }

    fn publish(&self) {
        let snapshot = ManagerSnapshot {
            state: ConnectionState::derive(&self.status, &self.retry),
            session: self.retry,
            status: self.status,
            online: self.online,
            authenticated: self.authenticated,
            pending_attempts: lock(&self.attempts).len(),
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn attempt(
    connector: &dyn SyncConnector,
    session: &dyn SessionSource,
    status: &watch::Receiver<ConnectionStatus>,
) -> Outcome {
    let credential = match session.credential().await {
        Ok(credential) => credential,
        Err(error) => {
            tracing::warn!(%error, "no credential for connection attempt");
            return Outcome::Failed;
        }
    };
    match connector.connect(&credential).await {
        Ok(()) if status.borrow().connected => Outcome::Connected,
        Ok(()) => Outcome::Inconclusive,
        Err(error) => {
            tracing::warn!(%error, reachability = error.is_reachability(), "connection attempt failed");
            Outcome::Failed
        }
    }
}
