// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power state tokens exchanged with devices.
//!
//! Device families disagree on letter case: Tasmota and the contact sensor
//! topics use upper-case `ON`/`OFF` and must be matched exactly, while FHEM
//! (EnOcean) accepts any case and expects lower-case commands.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// The on/off state of a switchable output.
///
/// # Examples
///
/// ```
/// use hap_mqtt::types::PowerState;
///
/// assert_eq!(PowerState::On.as_str(), "ON");
/// assert_eq!(PowerState::Off.as_lower_str(), "off");
///
/// // Exact match, as Tasmota reports it
/// assert_eq!(PowerState::from_exact("ON"), Some(PowerState::On));
/// assert_eq!(PowerState::from_exact("on"), None);
///
/// // Case-insensitive, as FHEM reports it
/// assert_eq!("On".parse::<PowerState>().unwrap(), PowerState::On);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Output is off.
    Off,
    /// Output is on.
    On,
}

impl PowerState {
    /// Returns the upper-case token (`ON`/`OFF`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Returns the lower-case token (`on`/`off`).
    #[must_use]
    pub const fn as_lower_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Returns `true` for [`PowerState::On`].
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }

    /// Matches the upper-case tokens exactly; anything else is `None`.
    #[must_use]
    pub fn from_exact(payload: &str) -> Option<Self> {
        match payload {
            "ON" => Some(Self::On),
            "OFF" => Some(Self::Off),
            _ => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("on") {
            Ok(Self::On)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(Self::Off)
        } else {
            Err(ValueError::InvalidPowerState(s.to_string()))
        }
    }
}

impl From<bool> for PowerState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

impl From<PowerState> for bool {
    fn from(value: PowerState) -> Self {
        value.is_on()
    }
}
