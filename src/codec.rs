// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary wire codec for the AllPowers BLE protocol.
//!
//! The protocol has exactly one outbound frame: a 9-byte full-state command
//! that re-sends every controllable toggle on each change. Inbound telemetry
//! arrives as notifications of at least 15 bytes with fields at fixed
//! offsets.
//!
//! # Frame layout
//!
//! Outbound command (9 bytes, template `A5 65 00 B1 01 01 00 00 71`):
//!
//! | Byte | Meaning                                     |
//! |------|---------------------------------------------|
//! | 0-6  | Fixed header from the template              |
//! | 7    | Bitfield: bit 0 DC, bit 1 AC, bit 5 light   |
//! | 8    | Checksum: `113 - byte7`, plus 4 when AC on  |
//!
//! Inbound notification (>= 15 bytes, trailing bytes ignored):
//!
//! | Byte  | Meaning                                     |
//! |-------|---------------------------------------------|
//! | 7     | Bitfield: bit 0 DC, bit 1 AC, bit 4 light   |
//! | 8     | Battery percent remaining                   |
//! | 9-10  | Input power in watts, big-endian            |
//! | 11-12 | Output power in watts, big-endian           |
//! | 13-14 | Minutes of battery remaining, big-endian    |

use crate::error::DecodeError;
use crate::state::DeviceState;

/// Template for the outbound status frame.
pub const STATUS_TEMPLATE: [u8; 9] = [0xA5, 0x65, 0x00, 0xB1, 0x01, 0x01, 0x00, 0x00, 0x71];

/// Minimum notification length covering all decoded fields.
pub const MIN_NOTIFICATION_LEN: usize = 15;

/// A controllable output of the power station.
///
/// This is the closed set of toggles the status frame can express. Setters
/// on the facade are a static mapping from these variants, there is no
/// name-based lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlField {
    /// The AC inverter output.
    Ac,
    /// The DC output.
    Dc,
    /// The built-in light.
    Light,
}

impl ControlField {
    /// All controllable fields, in frame bit order.
    pub const ALL: [Self; 3] = [Self::Dc, Self::Ac, Self::Light];
}

/// The requested toggle state used to build outbound status frames.
///
/// This is intent, not telemetry: setters flip these flags before the device
/// confirms anything. Confirmed state is [`DeviceState`], which only ever
/// reflects decoded notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    /// Whether the AC output is requested on.
    pub ac_on: bool,
    /// Whether the DC output is requested on.
    pub dc_on: bool,
    /// Whether the light is requested on.
    pub light_on: bool,
}

impl StatusFlags {
    /// Sets one controllable field.
    pub fn set(&mut self, field: ControlField, enabled: bool) {
        match field {
            ControlField::Ac => self.ac_on = enabled,
            ControlField::Dc => self.dc_on = enabled,
            ControlField::Light => self.light_on = enabled,
        }
    }

    /// Gets one controllable field.
    #[must_use]
    pub fn get(&self, field: ControlField) -> bool {
        match field {
            ControlField::Ac => self.ac_on,
            ControlField::Dc => self.dc_on,
            ControlField::Light => self.light_on,
        }
    }
}

/// Builds the 9-byte full-state command frame.
///
/// The protocol has no partial update: every toggle re-sends the complete
/// requested state.
#[must_use]
pub fn encode_status_frame(flags: StatusFlags) -> [u8; 9] {
    let mut frame = STATUS_TEMPLATE;

    let mut bits = 0u8;
    if flags.dc_on {
        bits |= 1 << 0;
    }
    if flags.ac_on {
        bits |= 1 << 1;
    }
    if flags.light_on {
        bits |= 1 << 5;
    }
    frame[7] = bits;

    // Empirically derived checksum. Known to be incomplete, but it holds for
    // every frame this crate can produce; the firmware's real algorithm has
    // not been reverse engineered.
    let mut checksum = 113 - bits;
    if flags.ac_on {
        checksum += 4;
    }
    frame[8] = checksum;

    frame
}

/// Decodes a telemetry notification into a [`DeviceState`] snapshot.
///
/// Bytes past the fixed field layout are ignored.
///
/// # Errors
///
/// Returns [`DecodeError::TooShort`] if the payload is shorter than
/// [`MIN_NOTIFICATION_LEN`] bytes. Callers must not update state on failure.
pub fn decode_notification(payload: &[u8]) -> Result<DeviceState, DecodeError> {
    if payload.len() < MIN_NOTIFICATION_LEN {
        return Err(DecodeError::TooShort {
            expected: MIN_NOTIFICATION_LEN,
            actual: payload.len(),
        });
    }

    let bits = payload[7];

    Ok(DeviceState {
        dc_on: bits & (1 << 0) != 0,
        ac_on: bits & (1 << 1) != 0,
        light_on: bits & (1 << 4) != 0,
        percent_remain: payload[8],
        watts_import: u16::from_be_bytes([payload[9], payload[10]]),
        watts_export: u16::from_be_bytes([payload[11], payload[12]]),
        minutes_remain: u16::from_be_bytes([payload[13], payload[14]]),
    })
}
