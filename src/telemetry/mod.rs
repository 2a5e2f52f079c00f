// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON payload codecs for device families that report composite state.
//!
//! - `tele/<topic>/SENSOR` from Tasmota climate sensors ([`ClimateSensorData`])
//! - `shellies/<name>/status/light:0` from Shelly dimmers ([`ShellyStatus`]),
//!   plus the comma-separated light commands Shelly accepts
//!
//! Fields are decoded as optionals and completeness is checked afterwards,
//! so a partial report is rejected as a whole instead of being half applied.

mod sensor_parser;
mod shelly;

pub use sensor_parser::{Bme280Sensor, ClimateReading, ClimateSensorData, Mhz19bSensor};
pub use shelly::{DimmerState, ShellyStatus, brightness_command, power_command};
