// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle management.
//!
//! The manager owns the transport session slot and guarantees at most one
//! live session per device. Concurrent connect requests collapse into a
//! single physical attempt behind the connect-mutex; teardown is idempotent
//! and flagged as expected so the disconnect observer can tell a requested
//! disconnect from a link loss.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::transport::{
    CHARACTERISTIC_NOTIFY, DeviceIdentity, DisconnectObserver, Session, Transport,
};

pub(crate) struct ConnectionManager {
    transport: Arc<dyn Transport>,
    identity: RwLock<DeviceIdentity>,
    /// Guards the "one physical connection at a time" invariant.
    connect_lock: Mutex<()>,
    session: RwLock<Option<Arc<dyn Session>>>,
    expected_disconnect: AtomicBool,
    /// Registered by the facade once its observer closure exists.
    observer: RwLock<Option<DisconnectObserver>>,
}

impl ConnectionManager {
    pub(crate) fn new(transport: Arc<dyn Transport>, identity: DeviceIdentity) -> Self {
        Self {
            transport,
            identity: RwLock::new(identity),
            connect_lock: Mutex::new(()),
            session: RwLock::new(None),
            expected_disconnect: AtomicBool::new(false),
            observer: RwLock::new(None),
        }
    }

    pub(crate) fn set_observer(&self, observer: DisconnectObserver) {
        *self.observer.write() = Some(observer);
    }

    pub(crate) fn identity(&self) -> DeviceIdentity {
        self.identity.read().clone()
    }

    pub(crate) fn set_identity(&self, identity: DeviceIdentity) {
        *self.identity.write() = identity;
    }

    /// Returns the stored session if its link is still up.
    pub(crate) fn live_session(&self) -> Option<Arc<dyn Session>> {
        self.session
            .read()
            .as_ref()
            .filter(|session| session.is_connected())
            .cloned()
    }

    /// Drops a stored session whose link went down. Sessions are never
    /// reused after invalidation.
    pub(crate) fn clear_session(&self) {
        *self.session.write() = None;
    }

    pub(crate) fn disconnect_was_expected(&self) -> bool {
        self.expected_disconnect.load(Ordering::SeqCst)
    }

    /// Ensures a live session exists, establishing one if needed.
    ///
    /// Fast path: a liveness check without taking the connect-mutex. Slow
    /// path: acquire the mutex, re-check liveness (callers that raced here
    /// collapse into the winner's attempt), then perform the physical
    /// connect and store the fresh session.
    pub(crate) async fn ensure_connected(&self) -> Result<Arc<dyn Session>, Error> {
        if let Some(session) = self.live_session() {
            return Ok(session);
        }

        let _guard = self.connect_lock.lock().await;

        // Check again while holding the lock
        if let Some(session) = self.live_session() {
            return Ok(session);
        }

        let identity = self.identity();
        tracing::debug!(
            device = %identity.display_name(),
            rssi = ?identity.rssi,
            "connecting"
        );

        let observer = self
            .observer
            .read()
            .clone()
            .unwrap_or_else(|| Arc::new(|| {}));

        let session = self
            .transport
            .connect(&identity, observer)
            .await
            .map_err(Error::Transport)?;

        self.expected_disconnect.store(false, Ordering::SeqCst);
        *self.session.write() = Some(Arc::clone(&session));

        tracing::debug!(device = %identity.display_name(), "connected");
        Ok(session)
    }

    /// Tears down the current session, marking the disconnect as expected.
    ///
    /// Idempotent: a no-op when no session is stored. Transport failures
    /// during teardown are logged, not propagated; the session is dropped
    /// either way.
    pub(crate) async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;

        self.expected_disconnect.store(true, Ordering::SeqCst);
        let session = self.session.write().take();

        let Some(session) = session else {
            return;
        };
        if !session.is_connected() {
            return;
        }

        let identity = self.identity();
        tracing::debug!(device = %identity.display_name(), "disconnecting");

        if let Err(err) = session.unsubscribe_notify(CHARACTERISTIC_NOTIFY).await {
            tracing::debug!(
                device = %identity.display_name(),
                error = %err,
                "failed to unsubscribe notifications during teardown"
            );
        }
        if let Err(err) = session.disconnect().await {
            tracing::warn!(
                device = %identity.display_name(),
                error = %err,
                "failed to close session during teardown"
            );
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("identity", &self.identity())
            .field("connected", &self.live_session().is_some())
            .finish()
    }
}
