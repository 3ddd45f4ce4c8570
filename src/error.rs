// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `allpowers_ble` library.
//!
//! This module provides the error hierarchy for handling failures across the
//! library: telemetry decoding and transport communication. Transport errors
//! are classified by how the library recovers from them, see
//! [`TransportError`].

use thiserror::Error;
use uuid::Uuid;

/// The main error type for this library.
///
/// This enum encompasses all possible errors that can occur when interacting
/// with an AllPowers power station.
#[derive(Debug, Error)]
pub enum Error {
    /// A telemetry notification could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error occurred at the BLE transport layer.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An operation required a live connection and none was available.
    #[error("device is not connected")]
    NotConnected,
}

/// Errors raised while decoding a telemetry notification.
///
/// Decode failures are non-fatal: the notification pipeline drops the
/// offending payload without touching the device state, and the next valid
/// notification self-heals.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The notification payload is shorter than the fixed field layout.
    #[error("notification too short: got {actual} bytes, need at least {expected}")]
    TooShort {
        /// Minimum number of bytes required.
        expected: usize,
        /// The number of bytes actually received.
        actual: usize,
    },
}

/// Errors raised by the BLE transport, classified by recovery strategy.
///
/// The command dispatcher and connection manager treat each variant
/// differently:
///
/// - [`DeviceNotFound`](TransportError::DeviceNotFound) is surfaced to the
///   caller; the background reconnect loop keeps retrying with backoff.
/// - [`CharacteristicMissing`](TransportError::CharacteristicMissing) is
///   surfaced immediately and never retried (firmware mismatch).
/// - [`Busy`](TransportError::Busy) is retried after a backoff and a
///   connection reset.
/// - [`Other`](TransportError::Other) is retried after a connection reset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device is unreachable or out of range.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A required GATT characteristic is absent from the device.
    #[error("characteristic {0} missing")]
    CharacteristicMissing(Uuid),

    /// The host BLE stack reported a transient busy condition.
    #[error("stack busy: {0}")]
    Busy(String),

    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the command dispatcher retries this error class.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Other(_))
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let err = DecodeError::TooShort {
            expected: 15,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "notification too short: got 7 bytes, need at least 15"
        );
    }

    #[test]
    fn error_from_decode_error() {
        let decode_err = DecodeError::TooShort {
            expected: 15,
            actual: 0,
        };
        let err: Error = decode_err.into();
        assert!(matches!(err, Error::Decode(DecodeError::TooShort { .. })));
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::DeviceNotFound("AA:BB:CC:DD:EE:FF".to_string());
        assert_eq!(err.to_string(), "device not found: AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Busy("dbus".into()).is_retryable());
        assert!(TransportError::Other("gatt".into()).is_retryable());
        assert!(!TransportError::DeviceNotFound("addr".into()).is_retryable());
        assert!(!TransportError::CharacteristicMissing(Uuid::nil()).is_retryable());
    }
}
