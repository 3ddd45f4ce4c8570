// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device telemetry state.

/// Telemetry snapshot of an AllPowers power station.
///
/// A snapshot is produced by decoding a single notification and replaces the
/// previous one wholesale; fields are never mutated individually and no
/// history is kept. It therefore only ever contains values the device itself
/// reported: a requested toggle (see
/// [`StatusFlags`](crate::codec::StatusFlags)) does not show up here until
/// the device confirms it in telemetry.
///
/// # Examples
///
/// ```
/// use allpowers_ble::DeviceState;
///
/// let state = DeviceState::default();
/// assert!(!state.ac_on);
/// assert_eq!(state.percent_remain, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceState {
    /// Whether the AC inverter output is on.
    pub ac_on: bool,
    /// Whether the DC output is on.
    pub dc_on: bool,
    /// Whether the built-in light is on.
    pub light_on: bool,
    /// Battery percentage remaining.
    pub percent_remain: u8,
    /// Minutes of battery remaining at the current load.
    pub minutes_remain: u16,
    /// Incoming (charging) power in watts.
    pub watts_import: u16,
    /// Outgoing (load) power in watts.
    pub watts_export: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_all_zero() {
        let state = DeviceState::default();
        assert!(!state.ac_on);
        assert!(!state.dc_on);
        assert!(!state.light_on);
        assert_eq!(state.percent_remain, 0);
        assert_eq!(state.minutes_remain, 0);
        assert_eq!(state.watts_import, 0);
        assert_eq!(state.watts_export, 0);
    }

    #[test]
    fn snapshots_compare_by_value() {
        let a = DeviceState {
            ac_on: true,
            percent_remain: 80,
            ..DeviceState::default()
        };
        let b = a;
        assert_eq!(a, b);
        assert_ne!(a, DeviceState::default());
    }
}
