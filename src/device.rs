// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level device facade for an AllPowers power station.
//!
//! [`AllpowersBle`] is the object external collaborators hold. It composes
//! the connection manager, command dispatcher, notification pipeline, and
//! callback registry, and exposes identity/state accessors plus the three
//! output setters.
//!
//! # State model
//!
//! Two states are tracked explicitly:
//!
//! - **Requested**: the toggle flags used to build outbound frames,
//!   flipped by setters before the device confirms anything.
//! - **Confirmed**: the latest decoded telemetry snapshot, which feeds
//!   every public accessor.
//!
//! A successful `set_ac(true)` therefore does not make [`ac_on`]
//! return `true` until the device's own notification reports it.
//!
//! [`ac_on`]: AllpowersBle::ac_on

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::codec::{self, ControlField, StatusFlags};
use crate::config::ConnectionConfig;
use crate::connection::ConnectionManager;
use crate::dispatch::CommandDispatcher;
use crate::error::{Error, TransportError};
use crate::notify::NotificationPipeline;
use crate::state::DeviceState;
use crate::subscription::{CallbackRegistry, SubscriptionId};
use crate::transport::{CHARACTERISTIC_NOTIFY, DeviceIdentity, Transport};

/// An AllPowers power station reachable over BLE.
///
/// Cloning is cheap and every clone controls the same device.
///
/// # Examples
///
/// ```ignore
/// use allpowers_ble::{AllpowersBle, DeviceIdentity};
///
/// let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF").with_name("Allpowers S300");
/// let device = AllpowersBle::new(transport, identity);
/// device.initialise().await?;
///
/// device.subscribe_state(|state| {
///     println!("battery at {}%", state.percent_remain);
/// });
///
/// device.set_ac(true).await?;
/// ```
#[derive(Clone)]
pub struct AllpowersBle {
    inner: Arc<Inner>,
}

struct Inner {
    connection: Arc<ConnectionManager>,
    dispatcher: CommandDispatcher,
    pipeline: Arc<NotificationPipeline>,
    state: Arc<RwLock<DeviceState>>,
    requested: RwLock<StatusFlags>,
    callbacks: Arc<CallbackRegistry>,
    config: ConnectionConfig,
    /// Captured at construction so the transport's disconnect observer can
    /// spawn the reconnect task from any thread.
    runtime: tokio::runtime::Handle,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl AllpowersBle {
    /// Creates a device with default connection behavior.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; the runtime handle is
    /// captured here for background reconnection.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, identity: DeviceIdentity) -> Self {
        Self::with_config(transport, identity, ConnectionConfig::default())
    }

    /// Creates a device with explicit connection behavior.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn with_config(
        transport: Arc<dyn Transport>,
        identity: DeviceIdentity,
        config: ConnectionConfig,
    ) -> Self {
        let connection = Arc::new(ConnectionManager::new(transport, identity));
        let state = Arc::new(RwLock::new(DeviceState::default()));
        let callbacks = Arc::new(CallbackRegistry::new());
        let pipeline = Arc::new(NotificationPipeline::new(
            Arc::clone(&state),
            Arc::clone(&callbacks),
        ));

        let inner = Arc::new(Inner {
            dispatcher: CommandDispatcher::new(Arc::clone(&connection), config),
            connection: Arc::clone(&connection),
            pipeline,
            state,
            requested: RwLock::new(StatusFlags::default()),
            callbacks,
            config,
            runtime: tokio::runtime::Handle::current(),
            reconnect_task: Mutex::new(None),
            stopped: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        connection.set_observer(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_transport_disconnect();
            }
        }));

        Self { inner }
    }

    // ========== Lifecycle ==========

    /// Connects to the device and subscribes to telemetry notifications.
    ///
    /// # Errors
    ///
    /// Returns error if the connection or the notify subscription fails.
    pub async fn initialise(&self) -> Result<(), Error> {
        self.inner.stopped.store(false, Ordering::SeqCst);
        self.inner.initialise().await
    }

    /// Stops the device: cancels any background reconnection and tears the
    /// connection down as an expected disconnect.
    ///
    /// Disconnect subscribers do not fire for this teardown. Safe to call
    /// repeatedly.
    pub async fn stop(&self) {
        tracing::debug!(device = %self.name(), "stop");
        self.inner.stopped.store(true, Ordering::SeqCst);
        let task = self.inner.reconnect_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        self.inner.connection.disconnect().await;
    }

    /// Returns `true` while a live connection exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.live_session().is_some()
    }

    // ========== Output control ==========

    /// Sets the AC inverter output.
    ///
    /// # Errors
    ///
    /// Returns error if the command could not be delivered; the device
    /// state is then unknown until the next telemetry notification.
    pub async fn set_ac(&self, enabled: bool) -> Result<(), Error> {
        self.set_field(ControlField::Ac, enabled).await
    }

    /// Sets the DC output.
    ///
    /// # Errors
    ///
    /// Returns error if the command could not be delivered.
    pub async fn set_dc(&self, enabled: bool) -> Result<(), Error> {
        self.set_field(ControlField::Dc, enabled).await
    }

    /// Sets the built-in light.
    ///
    /// # Errors
    ///
    /// Returns error if the command could not be delivered.
    pub async fn set_torch(&self, enabled: bool) -> Result<(), Error> {
        self.set_field(ControlField::Light, enabled).await
    }

    /// Sets one controllable field.
    ///
    /// The protocol has no partial update: the full requested state is
    /// re-encoded and sent as a single frame.
    ///
    /// # Errors
    ///
    /// Returns error if the command could not be delivered.
    pub async fn set_field(&self, field: ControlField, enabled: bool) -> Result<(), Error> {
        let frame = {
            let mut requested = self.inner.requested.write();
            requested.set(field, enabled);
            codec::encode_status_frame(*requested)
        };
        tracing::debug!(
            device = %self.name(),
            ?field,
            enabled,
            "sending status frame"
        );
        self.inner.dispatcher.send(&[frame.to_vec()]).await
    }

    /// Returns the requested (unconfirmed) toggle flags.
    #[must_use]
    pub fn requested(&self) -> StatusFlags {
        *self.inner.requested.read()
    }

    // ========== Identity ==========

    /// Returns the BLE address.
    #[must_use]
    pub fn address(&self) -> String {
        self.inner.connection.identity().address
    }

    /// Returns the device name, falling back to the address.
    #[must_use]
    pub fn name(&self) -> String {
        self.inner.connection.identity().display_name().to_string()
    }

    /// Returns the advertised signal strength, if known.
    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.inner.connection.identity().rssi
    }

    /// Refreshes the device identity from a newer advertisement.
    ///
    /// Discovery runs outside this crate; call this when it reports a new
    /// advertisement for the same device.
    pub fn set_device_and_rssi(&self, identity: DeviceIdentity) {
        self.inner.connection.set_identity(identity);
    }

    // ========== Telemetry accessors (never suspend) ==========

    /// Returns the latest confirmed telemetry snapshot.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        *self.inner.state.read()
    }

    /// Whether the device reports the AC output on.
    #[must_use]
    pub fn ac_on(&self) -> bool {
        self.state().ac_on
    }

    /// Whether the device reports the DC output on.
    #[must_use]
    pub fn dc_on(&self) -> bool {
        self.state().dc_on
    }

    /// Whether the device reports the light on.
    #[must_use]
    pub fn light_on(&self) -> bool {
        self.state().light_on
    }

    /// Battery percentage remaining.
    #[must_use]
    pub fn percent_remain(&self) -> u8 {
        self.state().percent_remain
    }

    /// Minutes of battery remaining at the current load.
    #[must_use]
    pub fn minutes_remain(&self) -> u16 {
        self.state().minutes_remain
    }

    /// Incoming (charging) power in watts.
    #[must_use]
    pub fn watts_import(&self) -> u16 {
        self.state().watts_import
    }

    /// Outgoing (load) power in watts.
    #[must_use]
    pub fn watts_export(&self) -> u16 {
        self.state().watts_export
    }

    // ========== Subscriptions ==========

    /// Registers a callback invoked with each new telemetry snapshot.
    pub fn subscribe_state<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DeviceState) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_state_changed(callback)
    }

    /// Registers a callback invoked on each unexpected disconnect.
    pub fn subscribe_disconnect<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks.on_disconnected(callback)
    }

    /// Removes a previously registered callback.
    ///
    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }
}

impl Inner {
    async fn initialise(&self) -> Result<(), Error> {
        let session = self.connection.ensure_connected().await?;

        let identity = self.connection.identity();
        tracing::debug!(
            device = %identity.display_name(),
            rssi = ?identity.rssi,
            "subscribing to telemetry notifications"
        );
        session
            .subscribe_notify(CHARACTERISTIC_NOTIFY, self.pipeline.handler())
            .await
            .map_err(Error::Transport)?;
        Ok(())
    }

    /// Disconnect observer: runs for every link drop the transport reports.
    fn on_transport_disconnect(self: &Arc<Self>) {
        self.connection.clear_session();

        let identity = self.connection.identity();
        if self.connection.disconnect_was_expected() {
            tracing::debug!(device = %identity.display_name(), "disconnected");
            return;
        }

        tracing::warn!(
            device = %identity.display_name(),
            rssi = ?identity.rssi,
            "device unexpectedly disconnected"
        );
        self.callbacks.dispatch_disconnected();
        self.start_reconnect();
    }

    /// Starts the reconnect loop unless one is already running.
    fn start_reconnect(self: &Arc<Self>) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut slot = self.reconnect_task.lock();
        if let Some(task) = slot.as_ref()
            && !task.is_finished()
        {
            return;
        }

        let inner = Arc::clone(self);
        *slot = Some(self.runtime.spawn(async move {
            inner.reconnect_loop().await;
        }));
    }

    /// Reconnects with fixed backoff until the device is reachable again.
    ///
    /// Only the not-found class is retried here; other failures are left
    /// to the command dispatcher's own retry path. The loop ends when a
    /// connect succeeds or [`AllpowersBle::stop`] cancels it.
    async fn reconnect_loop(&self) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            match self.initialise().await {
                Ok(()) => {
                    tracing::debug!(
                        device = %self.connection.identity().display_name(),
                        "reconnected"
                    );
                    return;
                }
                Err(Error::Transport(TransportError::DeviceNotFound(_))) => {
                    tracing::debug!(
                        device = %self.connection.identity().display_name(),
                        backoff = ?self.config.backoff,
                        "device not reachable, backing off"
                    );
                    tokio::time::sleep(self.config.backoff).await;
                }
                Err(err) => {
                    tracing::warn!(
                        device = %self.connection.identity().display_name(),
                        error = %err,
                        "reconnect attempt failed"
                    );
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for AllpowersBle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllpowersBle")
            .field("identity", &self.inner.connection.identity())
            .field("connected", &self.is_connected())
            .field("state", &self.state())
            .finish()
    }
}
