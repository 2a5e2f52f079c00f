// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for Tasmota `SENSOR` telemetry of climate sensors.

use serde::Deserialize;

use crate::error::ParseError;

/// Parsed sensor data from a `tele/<topic>/SENSOR` message.
///
/// Only the sensor groups a climate sensor reports are decoded; any other
/// keys (timestamp, pressure, units) are ignored.
///
/// # Examples
///
/// ```
/// use hap_mqtt::telemetry::ClimateSensorData;
///
/// let json = r#"{"Time":"2024-01-01T12:00:00",
///     "BME280":{"Temperature":21.5,"Humidity":48.2,"Pressure":1013.2},
///     "MHZ19B":{"Model":"B","CarbonDioxide":812,"Temperature":24.0}}"#;
/// let data = ClimateSensorData::parse(json.as_bytes()).unwrap();
///
/// let reading = data.climate().unwrap();
/// assert!((reading.temperature - 21.5).abs() < f64::EPSILON);
/// assert_eq!(data.carbon_dioxide(), Some(812.0));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClimateSensorData {
    /// BME280 temperature/humidity sensor.
    #[serde(rename = "BME280", default)]
    bme280: Option<Bme280Sensor>,

    /// MH-Z19B carbon dioxide sensor.
    #[serde(rename = "MHZ19B", default)]
    mhz19b: Option<Mhz19bSensor>,
}

/// BME280 environmental sensor reading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bme280Sensor {
    /// Temperature in configured units (C or F).
    #[serde(rename = "Temperature", default)]
    temperature: Option<f64>,

    /// Relative humidity (0-100%).
    #[serde(rename = "Humidity", default)]
    humidity: Option<f64>,
}

/// MH-Z19B carbon dioxide sensor reading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mhz19bSensor {
    /// Carbon dioxide concentration in ppm.
    #[serde(rename = "CarbonDioxide", default)]
    carbon_dioxide: Option<f64>,
}

/// A complete temperature and humidity reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Temperature.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
}

impl ClimateSensorData {
    /// Decodes a `SENSOR` payload.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the payload is not a JSON object of the
    /// expected shape.
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        serde_json::from_slice(payload).map_err(Into::into)
    }

    /// Returns the temperature and humidity pair.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MissingField` unless both values are present.
    pub fn climate(&self) -> Result<ClimateReading, ParseError> {
        let bme280 = self
            .bme280
            .as_ref()
            .ok_or_else(|| ParseError::MissingField("BME280".to_string()))?;
        let temperature = bme280
            .temperature
            .ok_or_else(|| ParseError::MissingField("BME280.Temperature".to_string()))?;
        let humidity = bme280
            .humidity
            .ok_or_else(|| ParseError::MissingField("BME280.Humidity".to_string()))?;

        Ok(ClimateReading {
            temperature,
            humidity,
        })
    }

    /// Returns the carbon dioxide concentration in ppm, if reported.
    #[must_use]
    pub fn carbon_dioxide(&self) -> Option<f64> {
        self.mhz19b.as_ref().and_then(|s| s.carbon_dioxide)
    }
}
