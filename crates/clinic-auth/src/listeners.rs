use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use clinic_core::AuthUser;

type Callback = Arc<dyn Fn(Option<&AuthUser>) + Send + Sync>;

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
}

/// Registry of auth-state-change callbacks.
///
/// Callbacks run synchronously on the notifying task, in subscription order.
#[derive(Clone, Default)]
pub struct AuthListeners {
    inner: Arc<Mutex<ListenerSet>>,
}

impl AuthListeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. It stays registered until the returned handle is
    /// dropped or [`AuthSubscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unregisters the callback"]
    pub fn subscribe<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(Option<&AuthUser>) + Send + Sync + 'static,
    {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = set.next_id;
        set.next_id += 1;
        set.callbacks.insert(id, Arc::new(callback));
        AuthSubscription {
            id,
            set: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every registered callback with the new user (`None` = signed out).
    pub fn notify(&self, user: Option<&AuthUser>) {
        // Snapshot so a callback may subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<Callback> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .values()
            .cloned()
            .collect();
        tracing::debug!(
            listeners = callbacks.len(),
            signed_in = user.is_some(),
            "auth state changed"
        );
        for callback in callbacks {
            callback(user);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a registered auth-state callback.
pub struct AuthSubscription {
    id: u64,
    set: Weak<Mutex<ListenerSet>>,
}

impl AuthSubscription {
    /// Unregister now. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(set) = self.set.upgrade() {
            set.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .remove(&self.id);
        }
    }
}
