//! Bounded reconnection policy as a pure transition function.
//!
//! [`step`] folds one [`Event`] into a [`RetrySession`] and says whether a
//! connection attempt should be scheduled. Nothing here touches a runtime,
//! so every rule is testable with plain `Instant` arithmetic.

use std::time::Duration;

use tokio::time::Instant;

use clinic_config::RetryConfig;
use clinic_core::ConnectionStatus;

pub const MAX_RETRIES: u32 = 2;
pub const COOLDOWN: Duration = Duration::from_millis(60_000);
pub const ATTEMPT_DELAY: Duration = Duration::from_millis(10_000);
pub const TICK_INTERVAL: Duration = Duration::from_millis(15_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Minimum time between two scheduled attempts.
    pub cooldown: Duration,
    /// Delay between scheduling an attempt and calling `connect()`.
    pub attempt_delay: Duration,
    /// Period of the re-evaluation tick.
    pub tick_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            cooldown: COOLDOWN,
            attempt_delay: ATTEMPT_DELAY,
            tick_interval: TICK_INTERVAL,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            cooldown: config.cooldown(),
            attempt_delay: config.attempt_delay(),
            tick_interval: config.tick_interval(),
        }
    }
}

/// Retry bookkeeping for one authenticated session.
///
/// Invariants: `given_up` implies `attempt_count >= max_retries`, and
/// `attempt_count` never exceeds `max_retries`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySession {
    pub attempt_count: u32,
    pub last_attempt_at: Option<Instant>,
    pub given_up: bool,
}

impl RetrySession {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempt_count: 0,
            last_attempt_at: None,
            given_up: false,
        }
    }

    const fn clear_backoff(mut self) -> Self {
        self.attempt_count = 0;
        self.given_up = false;
        self
    }

    fn record_attempt(mut self, now: Instant) -> Self {
        self.attempt_count += 1;
        self.last_attempt_at = Some(now);
        self
    }

    fn cooldown_elapsed(&self, policy: &RetryPolicy, now: Instant) -> bool {
        self.last_attempt_at
            .is_none_or(|at| now.saturating_duration_since(at) > policy.cooldown)
    }
}

/// Everything the policy reads from the outside world at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub status: ConnectionStatus,
    pub online: bool,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Status change, network change, or tick.
    Observed(Observation),
    /// A scheduled attempt called `connect()` and the status is now connected.
    AttemptSucceeded,
    /// A scheduled attempt could not connect.
    AttemptFailed,
    /// Sign-in or sign-out.
    SessionBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ScheduleAttempt { delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub session: RetrySession,
    pub action: Option<Action>,
}

impl Step {
    const fn idle(session: RetrySession) -> Self {
        Self {
            session,
            action: None,
        }
    }
}

#[must_use]
pub fn step(policy: &RetryPolicy, session: RetrySession, event: Event, now: Instant) -> Step {
    match event {
        Event::SessionBoundary => Step::idle(RetrySession::new()),
        Event::AttemptSucceeded => Step::idle(session.clear_backoff()),
        Event::AttemptFailed => {
            let mut next = session;
            if next.attempt_count >= policy.max_retries {
                next.given_up = true;
            }
            Step::idle(next)
        }
        Event::Observed(obs) => observe(policy, session, obs, now),
    }
}

fn observe(policy: &RetryPolicy, session: RetrySession, obs: Observation, now: Instant) -> Step {
    if session.given_up {
        return Step::idle(session);
    }
    let status = obs.status;
    if status.is_idle() && obs.online && obs.authenticated {
        if session.cooldown_elapsed(policy, now) && session.attempt_count < policy.max_retries {
            return Step {
                session: session.record_attempt(now),
                action: Some(Action::ScheduleAttempt {
                    delay: policy.attempt_delay,
                }),
            };
        }
        if session.attempt_count >= policy.max_retries {
            return Step::idle(RetrySession {
                given_up: true,
                ..session
            });
        }
        return Step::idle(session);
    }
    if status.connected {
        return Step::idle(session.clear_backoff());
    }
    Step::idle(session)
}

/// Result of a user-invoked "retry now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualRetry {
    /// `connect()` is being called now.
    Started,
    /// The attempt bound for this session is used up.
    Exhausted,
    NotAuthenticated,
    /// Already connected or connecting.
    Busy,
}

/// Manual override: skips the given-up gate and cooldown, not the bound.
#[must_use]
pub fn retry_now(
    policy: &RetryPolicy,
    session: RetrySession,
    obs: Observation,
    now: Instant,
) -> (RetrySession, ManualRetry) {
    if !obs.authenticated {
        return (session, ManualRetry::NotAuthenticated);
    }
    if !obs.status.is_idle() {
        return (session, ManualRetry::Busy);
    }
    if session.attempt_count >= policy.max_retries {
        let exhausted = RetrySession {
            given_up: true,
            ..session
        };
        return (exhausted, ManualRetry::Exhausted);
    }
    (session.record_attempt(now), ManualRetry::Started)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Disconnected with the retry bound exhausted. Terminal until sign-in or sign-out.
    GivenUp,
}

impl ConnectionState {
    #[must_use]
    pub const fn derive(status: &ConnectionStatus, session: &RetrySession) -> Self {
        if status.connected {
            Self::Connected
        } else if status.connecting {
            Self::Connecting
        } else if session.given_up {
            Self::GivenUp
        } else {
            Self::Disconnected
        }
    }
}
