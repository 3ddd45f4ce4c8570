// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for state-change and disconnect subscriptions.
//!
//! The registry keeps two ordered subscriber lists. Fan-out is synchronous
//! and runs in registration order; a panicking subscriber is isolated and
//! logged so the remaining subscribers still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::state::DeviceState;

/// Unique identifier for a subscription.
///
/// Returned when registering a callback; pass it to
/// [`CallbackRegistry::unsubscribe`] to remove the callback. IDs are unique
/// within a device's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Type alias for state-change callbacks.
type StateCallback = Arc<dyn Fn(&DeviceState) + Send + Sync>;

/// Type alias for disconnect callbacks.
type DisconnectedCallback = Arc<dyn Fn() + Send + Sync>;

/// Registry for device subscription callbacks.
///
/// Insertion order determines fan-out order. There is no uniqueness
/// constraint on subscriber identity beyond the returned token: the same
/// closure registered twice runs twice.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    state_callbacks: RwLock<Vec<(SubscriptionId, StateCallback)>>,
    disconnected_callbacks: RwLock<Vec<(SubscriptionId, DisconnectedCallback)>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state_callbacks: RwLock::new(Vec::new()),
            disconnected_callbacks: RwLock::new(Vec::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback invoked with each new telemetry snapshot.
    pub fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DeviceState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.state_callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Registers a callback invoked on each unexpected disconnect.
    pub fn on_disconnected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.disconnected_callbacks
            .write()
            .push((id, Arc::new(callback)));
        id
    }

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state_callbacks.write();
        if let Some(pos) = state.iter().position(|(entry, _)| *entry == id) {
            state.remove(pos);
            return true;
        }
        drop(state);

        let mut disconnected = self.disconnected_callbacks.write();
        if let Some(pos) = disconnected.iter().position(|(entry, _)| *entry == id) {
            disconnected.remove(pos);
            return true;
        }
        false
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.state_callbacks.write().clear();
        self.disconnected_callbacks.write().clear();
    }

    /// Dispatches a telemetry snapshot to state subscribers in
    /// registration order.
    pub fn dispatch_state(&self, state: &DeviceState) {
        let callbacks: Vec<StateCallback> = self
            .state_callbacks
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            invoke_isolated("state", || callback(state));
        }
    }

    /// Dispatches the disconnected event to disconnect subscribers in
    /// registration order.
    pub fn dispatch_disconnected(&self) {
        let callbacks: Vec<DisconnectedCallback> = self
            .disconnected_callbacks
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            invoke_isolated("disconnected", || callback());
        }
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.state_callbacks.read().len() + self.disconnected_callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

/// Runs one subscriber, containing a panic so the rest of the fan-out
/// still happens. The failure is the subscriber's responsibility; it is
/// logged rather than silently absorbed.
fn invoke_isolated(kind: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(kind, "subscriber panicked during callback fan-out");
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
    }

    #[test]
    fn registry_new_is_empty() {
        let registry = CallbackRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.callback_count(), 0);
    }

    #[test]
    fn state_callback_receives_snapshot() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(None::<DeviceState>));
        let seen_clone = seen.clone();

        let id = registry.on_state_changed(move |state| {
            *seen_clone.lock().unwrap() = Some(*state);
        });

        let state = DeviceState {
            ac_on: true,
            percent_remain: 55,
            ..DeviceState::default()
        };
        registry.dispatch_state(&state);
        assert_eq!(*seen.lock().unwrap(), Some(state));

        assert!(registry.unsubscribe(id));
        registry.dispatch_state(&DeviceState::default());
        assert_eq!(*seen.lock().unwrap(), Some(state));
    }

    #[test]
    fn fan_out_runs_in_registration_order() {
        let registry = CallbackRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..5u32 {
            let order = order.clone();
            registry.on_state_changed(move |_| order.lock().unwrap().push(tag));
        }

        registry.dispatch_state(&DeviceState::default());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_the_rest() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));

        registry.on_disconnected(|| panic!("subscriber bug"));
        let counter_clone = counter.clone();
        registry.on_disconnected(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch_disconnected();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_callback_fires() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let id = registry.on_disconnected(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch_disconnected();
        registry.dispatch_disconnected();
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        assert!(registry.unsubscribe(id));
        registry.dispatch_disconnected();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_closure_can_subscribe_twice() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let counter = counter.clone();
            registry.on_disconnected(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.dispatch_disconnected();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_nonexistent_returns_false() {
        let registry = CallbackRegistry::new();
        assert!(!registry.unsubscribe(SubscriptionId::new(999)));
    }

    #[test]
    fn clear_removes_everything() {
        let registry = CallbackRegistry::new();
        registry.on_state_changed(|_| {});
        registry.on_disconnected(|| {});
        assert_eq!(registry.callback_count(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_are_unique_across_lists() {
        let registry = CallbackRegistry::new();
        let id1 = registry.on_state_changed(|_| {});
        let id2 = registry.on_disconnected(|| {});
        assert_ne!(id1, id2);
    }

    #[test]
    fn registry_debug() {
        let registry = CallbackRegistry::new();
        registry.on_state_changed(|_| {});
        let debug = format!("{registry:?}");
        assert!(debug.contains("CallbackRegistry"));
        assert!(debug.contains("callback_count"));
    }
}
