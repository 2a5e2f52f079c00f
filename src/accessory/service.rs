// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed HAP services built from characteristics.
//!
//! Each service owns its characteristics through `Arc`s so that bus
//! handlers and observers can hold clones for the adapter's lifetime.

use std::sync::Arc;

use crate::types::Brightness;

use super::characteristic::{
    CarbonDioxideDetected, Characteristic, CharacteristicType, ContactSensorState,
};

/// The HAP service types the bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// A light, optionally dimmable.
    Lightbulb,
    /// A contact sensor.
    ContactSensor,
    /// A temperature sensor.
    TemperatureSensor,
    /// A humidity sensor.
    HumiditySensor,
    /// A carbon dioxide sensor.
    CarbonDioxideSensor,
}

impl ServiceType {
    /// Returns the short form of the HAP type UUID.
    #[must_use]
    pub const fn type_code(&self) -> u16 {
        match self {
            Self::Lightbulb => 0x43,
            Self::ContactSensor => 0x80,
            Self::TemperatureSensor => 0x8A,
            Self::HumiditySensor => 0x82,
            Self::CarbonDioxideSensor => 0x97,
        }
    }
}

/// Common surface of the typed services.
pub trait Service {
    /// Returns the HAP service type.
    fn service_type(&self) -> ServiceType;

    /// Returns the types of the characteristics the service carries.
    fn characteristic_types(&self) -> Vec<CharacteristicType>;
}

/// A light with on/off control only.
#[derive(Debug, Clone)]
pub struct Lightbulb {
    /// Power state.
    pub on: Arc<Characteristic<bool>>,
}

impl Lightbulb {
    /// Creates a lightbulb service that starts switched off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            on: Arc::new(Characteristic::new(CharacteristicType::On, false)),
        }
    }
}

impl Default for Lightbulb {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for Lightbulb {
    fn service_type(&self) -> ServiceType {
        ServiceType::Lightbulb
    }

    fn characteristic_types(&self) -> Vec<CharacteristicType> {
        vec![self.on.kind()]
    }
}

/// A light with on/off and brightness control.
#[derive(Debug, Clone)]
pub struct DimmableLightbulb {
    /// Power state.
    pub on: Arc<Characteristic<bool>>,
    /// Brightness level.
    pub brightness: Arc<Characteristic<Brightness>>,
}

impl DimmableLightbulb {
    /// Creates a dimmable lightbulb service that starts off at 0%.
    #[must_use]
    pub fn new() -> Self {
        Self {
            on: Arc::new(Characteristic::new(CharacteristicType::On, false)),
            brightness: Arc::new(Characteristic::new(
                CharacteristicType::Brightness,
                Brightness::MIN,
            )),
        }
    }
}

impl Default for DimmableLightbulb {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for DimmableLightbulb {
    fn service_type(&self) -> ServiceType {
        ServiceType::Lightbulb
    }

    fn characteristic_types(&self) -> Vec<CharacteristicType> {
        vec![self.on.kind(), self.brightness.kind()]
    }
}

/// A contact sensor.
#[derive(Debug, Clone)]
pub struct ContactSensor {
    /// Contact state.
    pub state: Arc<Characteristic<ContactSensorState>>,
}

impl ContactSensor {
    /// Creates a contact sensor service reporting no contact.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Characteristic::new(
                CharacteristicType::ContactSensorState,
                ContactSensorState::NotDetected,
            )),
        }
    }
}

impl Default for ContactSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for ContactSensor {
    fn service_type(&self) -> ServiceType {
        ServiceType::ContactSensor
    }

    fn characteristic_types(&self) -> Vec<CharacteristicType> {
        vec![self.state.kind()]
    }
}

/// A temperature sensor.
#[derive(Debug, Clone)]
pub struct TemperatureSensor {
    /// Temperature in degrees Celsius.
    pub current_temperature: Arc<Characteristic<f64>>,
}

impl TemperatureSensor {
    /// Creates a temperature sensor service reading 0 °C.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_temperature: Arc::new(Characteristic::new(
                CharacteristicType::CurrentTemperature,
                0.0,
            )),
        }
    }
}

impl Default for TemperatureSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for TemperatureSensor {
    fn service_type(&self) -> ServiceType {
        ServiceType::TemperatureSensor
    }

    fn characteristic_types(&self) -> Vec<CharacteristicType> {
        vec![self.current_temperature.kind()]
    }
}

/// A relative humidity sensor.
#[derive(Debug, Clone)]
pub struct HumiditySensor {
    /// Relative humidity in percent.
    pub current_relative_humidity: Arc<Characteristic<f64>>,
}

impl HumiditySensor {
    /// Creates a humidity sensor service reading 0 %.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_relative_humidity: Arc::new(Characteristic::new(
                CharacteristicType::CurrentRelativeHumidity,
                0.0,
            )),
        }
    }
}

impl Default for HumiditySensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for HumiditySensor {
    fn service_type(&self) -> ServiceType {
        ServiceType::HumiditySensor
    }

    fn characteristic_types(&self) -> Vec<CharacteristicType> {
        vec![self.current_relative_humidity.kind()]
    }
}

/// A carbon dioxide sensor with level and peak level readings.
#[derive(Debug, Clone)]
pub struct CarbonDioxideSensor {
    /// Normal / abnormal classification.
    pub detected: Arc<Characteristic<CarbonDioxideDetected>>,
    /// Current concentration in ppm.
    pub level: Arc<Characteristic<f64>>,
    /// Highest concentration seen since startup, in ppm.
    pub peak_level: Arc<Characteristic<f64>>,
}

impl CarbonDioxideSensor {
    /// Creates a carbon dioxide sensor service reporting normal levels.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detected: Arc::new(Characteristic::new(
                CharacteristicType::CarbonDioxideDetected,
                CarbonDioxideDetected::Normal,
            )),
            level: Arc::new(Characteristic::new(
                CharacteristicType::CarbonDioxideLevel,
                0.0,
            )),
            peak_level: Arc::new(Characteristic::new(
                CharacteristicType::CarbonDioxidePeakLevel,
                0.0,
            )),
        }
    }
}

impl Default for CarbonDioxideSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Service for CarbonDioxideSensor {
    fn service_type(&self) -> ServiceType {
        ServiceType::CarbonDioxideSensor
    }

    fn characteristic_types(&self) -> Vec<CharacteristicType> {
        vec![
            self.detected.kind(),
            self.level.kind(),
            self.peak_level.kind(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimmable_lightbulb_characteristics() {
        let service = DimmableLightbulb::new();
        assert_eq!(service.service_type(), ServiceType::Lightbulb);
        assert_eq!(
            service.characteristic_types(),
            vec![CharacteristicType::On, CharacteristicType::Brightness]
        );
        assert!(!service.on.value());
        assert_eq!(service.brightness.value(), Brightness::MIN);
    }

    #[test]
    fn contact_sensor_starts_not_detected() {
        let service = ContactSensor::new();
        assert_eq!(service.state.value(), ContactSensorState::NotDetected);
    }

    #[test]
    fn carbon_dioxide_sensor_starts_normal_at_zero() {
        let service = CarbonDioxideSensor::new();
        assert_eq!(service.detected.value(), CarbonDioxideDetected::Normal);
        assert!(service.peak_level.value().abs() < f64::EPSILON);
        assert_eq!(service.characteristic_types().len(), 3);
    }

    #[test]
    fn clones_share_characteristics() {
        let service = Lightbulb::new();
        let clone = service.clone();
        clone.on.set_value(true);
        assert!(service.on.value());
    }
}
