//! Live proxies grouped by identity, for group invalidation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use super::policy::IdentityKey;

/// Validity flag shared by one proxy and the registry.
#[derive(Debug, Default)]
pub struct HandlerState {
    invalid: AtomicBool,
}

impl HandlerState {
    /// Creates a valid state.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns true once the proxy is permanently invalid.
    pub fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    /// Marks the proxy invalid. Returns false if it already was.
    pub fn invalidate(&self) -> bool {
        !self.invalid.swap(true, Ordering::AcqRel)
    }
}

/// Weakly held proxy states by identity key.
///
/// Entries of dropped proxies are swept on every registration.
#[derive(Default)]
pub struct HandleRegistry {
    live: Mutex<HashMap<IdentityKey, Vec<Weak<HandlerState>>>>,
}

impl HandleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a proxy state under its key.
    pub fn register(&self, key: IdentityKey, state: &Arc<HandlerState>) {
        let mut live = self.live.lock().unwrap_or_else(|p| p.into_inner());
        live.retain(|_, states| {
            states.retain(|s| s.strong_count() > 0);
            !states.is_empty()
        });
        live.entry(key).or_default().push(Arc::downgrade(state));
    }

    /// Invalidates every live proxy registered under `key`.
    ///
    /// Returns how many proxies changed from valid to invalid.
    pub fn invalidate_group(&self, key: &IdentityKey) -> usize {
        let states = {
            let mut live = self.live.lock().unwrap_or_else(|p| p.into_inner());
            live.remove(key).unwrap_or_default()
        };
        let count = states
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|state| state.invalidate())
            .count();
        debug!(count, "invalidated identity group");
        count
    }

    /// Returns the number of live proxies registered under `key`.
    pub fn live_count(&self, key: &IdentityKey) -> usize {
        let live = self.live.lock().unwrap_or_else(|p| p.into_inner());
        live.get(key)
            .map(|states| states.iter().filter(|s| s.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Returns the number of keys with registrations, swept or not.
    pub fn len(&self) -> usize {
        self.live.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("keys", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::policy::BeanPolicy;
    use ejb_core::{ObjectCodec, Value};

    fn key(pk: i64) -> IdentityKey {
        BeanPolicy::Entity
            .identity_key(&ObjectCodec::new(), "Account", &Value::from(pk))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_group_invalidation_reaches_every_member() {
        let registry = HandleRegistry::new();
        let a = HandlerState::new();
        let b = HandlerState::new();
        let other = HandlerState::new();
        registry.register(key(1), &a);
        registry.register(key(1), &b);
        registry.register(key(2), &other);

        assert_eq!(registry.invalidate_group(&key(1)), 2);
        assert!(a.is_invalid());
        assert!(b.is_invalid());
        assert!(!other.is_invalid());
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let state = HandlerState::new();
        assert!(state.invalidate());
        assert!(!state.invalidate());
        assert!(state.is_invalid());

        let registry = HandleRegistry::new();
        registry.register(key(1), &state);
        assert_eq!(registry.invalidate_group(&key(1)), 0);
        assert_eq!(registry.invalidate_group(&key(1)), 0);
    }

    #[test]
    fn test_dropped_states_are_swept() {
        let registry = HandleRegistry::new();
        let kept = HandlerState::new();
        {
            let dropped = HandlerState::new();
            registry.register(key(9), &dropped);
        }
        assert_eq!(registry.live_count(&key(9)), 0);
        registry.register(key(1), &kept);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.live_count(&key(1)), 1);
    }
}
