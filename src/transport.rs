// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The BLE transport capability this library depends on.
//!
//! Device discovery and the GATT stack itself are out of scope: embedders
//! supply a [`Transport`] implementation (typically a thin adapter over
//! their platform's BLE library) and this crate drives it. The contract is
//! deliberately small:
//!
//! - [`Transport::connect`] establishes a session and registers a
//!   disconnect observer for connection-loss detection.
//! - [`Session`] exposes characteristic writes, notification subscription,
//!   and explicit teardown on the live link.
//!
//! Implementations must map their native failures onto the
//! [`TransportError`] classes, since retry and reconnect policy is chosen
//! per class.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::{Uuid, uuid};

use crate::error::TransportError;

/// Notify characteristic carrying telemetry frames.
pub const CHARACTERISTIC_NOTIFY: Uuid = uuid!("0000fff1-0000-1000-8000-00805f9b34fb");

/// Write-only characteristic accepting command frames.
pub const CHARACTERISTIC_WRITE: Uuid = uuid!("0000fff2-0000-1000-8000-00805f9b34fb");

/// Identity of a discovered power station.
///
/// Discovery happens outside this crate; the identity is supplied at
/// construction and may be refreshed as new advertisements arrive. The RSSI
/// is informational only and may be stale or absent, it never blocks any
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Stable BLE address of the device.
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength from the most recent advertisement, if any.
    pub rssi: Option<i16>,
}

impl DeviceIdentity {
    /// Creates an identity from a BLE address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: None,
        }
    }

    /// Sets the advertised device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the advertised signal strength.
    #[must_use]
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Returns the device name, falling back to the address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Callback invoked by the transport when the link drops.
///
/// Called for both requested and unexpected disconnects; the connection
/// manager tells them apart.
pub type DisconnectObserver = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked with each raw notification payload.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Capability to establish GATT sessions with a device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to the device and registers a disconnect observer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::DeviceNotFound`] when the device is
    /// unreachable, or another class for stack-level failures.
    async fn connect(
        &self,
        identity: &DeviceIdentity,
        on_disconnect: DisconnectObserver,
    ) -> Result<Arc<dyn Session>, TransportError>;
}

/// A live GATT session with the device.
///
/// A session is created by a successful [`Transport::connect`] and is never
/// reused once it reports disconnected; re-establishing the link yields a
/// fresh session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Writes a command frame to a characteristic (without response).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CharacteristicMissing`] if the device does
    /// not expose the characteristic, or another class for write failures.
    async fn write_characteristic(
        &self,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Subscribes to notifications on a characteristic.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the subscription cannot be
    /// established.
    async fn subscribe_notify(
        &self,
        characteristic: Uuid,
        handler: NotificationHandler,
    ) -> Result<(), TransportError>;

    /// Cancels a notification subscription.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the stack rejects the request.
    async fn unsubscribe_notify(&self, characteristic: Uuid) -> Result<(), TransportError>;

    /// Tears the session down.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the stack rejects the request.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Returns `true` while the link is up.
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_advertised_name() {
        let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF").with_name("Allpowers S300");
        assert_eq!(identity.display_name(), "Allpowers S300");
    }

    #[test]
    fn display_name_falls_back_to_address() {
        let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(identity.display_name(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn rssi_is_optional() {
        let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF");
        assert!(identity.rssi.is_none());
        assert_eq!(identity.with_rssi(-60).rssi, Some(-60));
    }

    #[test]
    fn characteristic_uuids() {
        assert_eq!(
            CHARACTERISTIC_NOTIFY.to_string(),
            "0000fff1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            CHARACTERISTIC_WRITE.to_string(),
            "0000fff2-0000-1000-8000-00805f9b34fb"
        );
    }
}
