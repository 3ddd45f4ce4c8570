// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `allpowers_ble` - A Rust library to monitor and control AllPowers
//! portable power stations over Bluetooth Low Energy.
//!
//! The library maintains a resilient GATT connection to a single power
//! station, serializes outbound commands through a single-flight dispatcher,
//! decodes asynchronous telemetry notifications into immutable state
//! snapshots, and recovers transparently from transient radio and stack
//! failures.
//!
//! # Supported Features
//!
//! - **Output control**: AC inverter, DC output, built-in light
//! - **Telemetry**: battery percentage, minutes remaining, import/export
//!   power in watts
//! - **Auto-reconnection**: fixed backoff with a cancellable background loop
//! - **Subscriptions**: ordered state-change and disconnect callbacks
//!
//! # Transport
//!
//! Device discovery and the GATT stack are out of scope: embedders supply
//! a [`Transport`] implementation adapting their platform BLE library, and
//! construct the device from an externally discovered [`DeviceIdentity`].
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use allpowers_ble::{AllpowersBle, DeviceIdentity};
//!
//! #[tokio::main]
//! async fn main() -> allpowers_ble::Result<()> {
//!     // `MyGattTransport` adapts the platform BLE stack to the
//!     // `Transport` trait.
//!     let transport = Arc::new(MyGattTransport::new());
//!     let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF")
//!         .with_name("Allpowers S300")
//!         .with_rssi(-58);
//!
//!     let device = AllpowersBle::new(transport, identity);
//!     device.initialise().await?;
//!
//!     device.subscribe_state(|state| {
//!         println!("battery {}%, exporting {} W", state.percent_remain, state.watts_export);
//!     });
//!
//!     device.set_ac(true).await?;
//!     Ok(())
//! }
//! ```
//!
//! # State model
//!
//! Accessors such as [`AllpowersBle::ac_on`] report only what the device
//! itself confirmed in telemetry; the requested toggle state used to build
//! command frames is tracked separately and readable via
//! [`AllpowersBle::requested`].

pub mod codec;
mod config;
mod connection;
mod device;
mod dispatch;
pub mod error;
mod notify;
pub mod state;
pub mod subscription;
pub mod transport;

pub use codec::{ControlField, StatusFlags, decode_notification, encode_status_frame};
pub use config::{ConnectionConfig, RetryBudget};
pub use device::AllpowersBle;
pub use error::{DecodeError, Error, Result, TransportError};
pub use state::DeviceState;
pub use subscription::{CallbackRegistry, SubscriptionId};
pub use transport::{
    CHARACTERISTIC_NOTIFY, CHARACTERISTIC_WRITE, DeviceIdentity, DisconnectObserver,
    NotificationHandler, Session, Transport,
};
