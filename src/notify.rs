// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound telemetry pipeline.
//!
//! One handler per connection (re-registered after every reconnect): each
//! raw payload is decoded, and on success the state snapshot is replaced
//! wholesale before subscribers are fanned out in arrival order. Malformed
//! payloads are dropped without touching state; the next valid notification
//! self-heals.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec;
use crate::state::DeviceState;
use crate::subscription::CallbackRegistry;
use crate::transport::NotificationHandler;

pub(crate) struct NotificationPipeline {
    state: Arc<RwLock<DeviceState>>,
    callbacks: Arc<CallbackRegistry>,
}

impl NotificationPipeline {
    pub(crate) fn new(state: Arc<RwLock<DeviceState>>, callbacks: Arc<CallbackRegistry>) -> Self {
        Self { state, callbacks }
    }

    pub(crate) fn handle(&self, payload: &[u8]) {
        match codec::decode_notification(payload) {
            Ok(snapshot) => {
                tracing::debug!(?snapshot, "notification decoded");
                *self.state.write() = snapshot;
                self.callbacks.dispatch_state(&snapshot);
            }
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    len = payload.len(),
                    "dropping malformed notification"
                );
            }
        }
    }

    /// Builds the handler passed to the transport's notify subscription.
    pub(crate) fn handler(self: &Arc<Self>) -> NotificationHandler {
        let pipeline = Arc::clone(self);
        Arc::new(move |payload| pipeline.handle(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn pipeline() -> (
        Arc<RwLock<DeviceState>>,
        Arc<CallbackRegistry>,
        NotificationPipeline,
    ) {
        let state = Arc::new(RwLock::new(DeviceState::default()));
        let callbacks = Arc::new(CallbackRegistry::new());
        let pipeline = NotificationPipeline::new(Arc::clone(&state), Arc::clone(&callbacks));
        (state, callbacks, pipeline)
    }

    #[test]
    fn valid_payload_replaces_state_and_fans_out() {
        let (state, callbacks, pipeline) = pipeline();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        callbacks.on_state_changed(move |snapshot| {
            assert!(snapshot.ac_on);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut payload = [0u8; 15];
        payload[7] = 0x02;
        payload[8] = 77;
        pipeline.handle(&payload);

        assert!(state.read().ac_on);
        assert_eq!(state.read().percent_remain, 77);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn short_payload_is_dropped_without_state_change() {
        let (state, callbacks, pipeline) = pipeline();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        callbacks.on_state_changed(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        let mut payload = [0u8; 15];
        payload[8] = 42;
        pipeline.handle(&payload);
        assert_eq!(state.read().percent_remain, 42);

        // A short follow-up must leave the previous snapshot intact.
        pipeline.handle(&[0xA5, 0x65]);
        assert_eq!(state.read().percent_remain, 42);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notifications_fan_out_in_arrival_order() {
        let (_state, callbacks, pipeline) = pipeline();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        callbacks.on_state_changed(move |snapshot| {
            seen_clone.lock().push(snapshot.percent_remain);
        });

        for percent in [10u8, 20, 30] {
            let mut payload = [0u8; 15];
            payload[8] = percent;
            pipeline.handle(&payload);
        }

        assert_eq!(*seen.lock(), vec![10, 20, 30]);
    }
}
