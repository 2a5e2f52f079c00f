// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shelly dimmer status payloads and light commands.

use serde::Deserialize;

use crate::error::ParseError;
use crate::types::Brightness;

/// Status report from `shellies/<name>/status/light:0`.
///
/// Shelly may omit either field; a status is only usable when both are
/// present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShellyStatus {
    /// Output state.
    #[serde(default)]
    output: Option<bool>,

    /// Brightness level.
    #[serde(default)]
    brightness: Option<i64>,
}

/// A complete dimmer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimmerState {
    /// Whether the output is on.
    pub on: bool,
    /// Brightness level.
    pub brightness: Brightness,
}

impl ShellyStatus {
    /// Decodes a status payload.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload is not valid JSON.
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        serde_json::from_slice(payload).map_err(Into::into)
    }

    /// Returns the complete state.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MissingField` if either field is absent, or
    /// `ParseError::InvalidValue` if the brightness is outside 0-100.
    ///
    /// # Examples
    ///
    /// ```
    /// use hap_mqtt::telemetry::ShellyStatus;
    ///
    /// let status = ShellyStatus::parse(br#"{"output":true,"brightness":55}"#).unwrap();
    /// let state = status.state().unwrap();
    /// assert!(state.on);
    /// assert_eq!(state.brightness.value(), 55);
    ///
    /// let partial = ShellyStatus::parse(br#"{"output":true}"#).unwrap();
    /// assert!(partial.state().is_err());
    /// ```
    pub fn state(&self) -> Result<DimmerState, ParseError> {
        let on = self
            .output
            .ok_or_else(|| ParseError::MissingField("output".to_string()))?;
        let raw = self
            .brightness
            .ok_or_else(|| ParseError::MissingField("brightness".to_string()))?;
        let brightness = Brightness::try_from(raw).map_err(|e| ParseError::InvalidValue {
            field: "brightness".to_string(),
            message: e.to_string(),
        })?;

        Ok(DimmerState { on, brightness })
    }
}

/// Builds the command that sets power and level at once.
///
/// A level of 0 switches the light off.
///
/// # Examples
///
/// ```
/// use hap_mqtt::telemetry::brightness_command;
/// use hap_mqtt::types::Brightness;
///
/// assert_eq!(brightness_command(Brightness::new(40).unwrap()), "set,true,40");
/// assert_eq!(brightness_command(Brightness::MIN), "set,false,0");
/// ```
#[must_use]
pub fn brightness_command(level: Brightness) -> String {
    if level.is_off() {
        "set,false,0".to_string()
    } else {
        format!("set,true,{level}")
    }
}

/// Builds the command that only switches power.
#[must_use]
pub fn power_command(on: bool) -> String {
    format!("set,{on}")
}
