// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tasmota climate sensor adapter (BME280, optional MH-Z19B).

use std::any::Any;
use std::sync::Arc;

use tracing::error;

use super::{DeviceAdapter, DeviceClass, new_accessory, subscribe, subscribe_liveness};
use crate::accessory::{
    Accessory, CarbonDioxideDetected, CarbonDioxideSensor, HumiditySensor, TemperatureSensor,
};
use crate::bus::{Bus, Message};
use crate::config::DeviceDescriptor;
use crate::error::Result;
use crate::telemetry::ClimateSensorData;

/// Carbon dioxide level (ppm) above which the sensor reports abnormal.
pub const CO2_ABNORMAL_THRESHOLD: f64 = 1600.0;

/// First option value that disables the carbon dioxide services.
const NO_CO2: &str = "noco2";

/// Adapter for a Tasmota climate sensor.
///
/// Temperature and humidity are applied together or not at all. Carbon
/// dioxide readings additionally drive the detected state and a peak level
/// that only ever grows.
#[derive(Debug)]
pub struct TasmotaClimateSensorAdapter {
    descriptor: DeviceDescriptor,
    accessory: Accessory,
    temperature: TemperatureSensor,
    humidity: HumiditySensor,
    carbon_dioxide: Option<CarbonDioxideSensor>,
}

impl TasmotaClimateSensorAdapter {
    /// Builds the adapter and its accessory.
    #[must_use]
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        let mut accessory = new_accessory(DeviceClass::TasmotaClimateSensor, id, &descriptor);

        let temperature = TemperatureSensor::new();
        accessory.add_service(&temperature);
        let humidity = HumiditySensor::new();
        accessory.add_service(&humidity);

        let carbon_dioxide = (descriptor.first_option() != Some(NO_CO2)).then(|| {
            let sensor = CarbonDioxideSensor::new();
            accessory.add_service(&sensor);
            sensor
        });

        Self {
            descriptor,
            accessory,
            temperature,
            humidity,
            carbon_dioxide,
        }
    }

    /// Returns the temperature service.
    #[must_use]
    pub fn temperature(&self) -> &TemperatureSensor {
        &self.temperature
    }

    /// Returns the humidity service.
    #[must_use]
    pub fn humidity(&self) -> &HumiditySensor {
        &self.humidity
    }

    /// Returns the carbon dioxide service unless disabled with `noco2`.
    #[must_use]
    pub fn carbon_dioxide(&self) -> Option<&CarbonDioxideSensor> {
        self.carbon_dioxide.as_ref()
    }
}

fn apply_carbon_dioxide(sensor: &CarbonDioxideSensor, level: f64) {
    let detected = if level > CO2_ABNORMAL_THRESHOLD {
        CarbonDioxideDetected::Abnormal
    } else {
        CarbonDioxideDetected::Normal
    };
    sensor.detected.set_value(detected);
    sensor
        .peak_level
        .update(|peak| (level > *peak).then_some(level));
    sensor.level.set_value(level);
}

impl DeviceAdapter for TasmotaClimateSensorAdapter {
    fn class(&self) -> DeviceClass {
        DeviceClass::TasmotaClimateSensor
    }

    fn accessory(&self) -> &Accessory {
        &self.accessory
    }

    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bind(&self, bus: &Arc<dyn Bus>) -> Result<()> {
        let name = self.descriptor.name.as_str();
        subscribe_liveness(bus.as_ref(), name, &format!("tele/{name}/LWT"), "offline")?;

        let temperature = Arc::clone(&self.temperature.current_temperature);
        let humidity = Arc::clone(&self.humidity.current_relative_humidity);
        let carbon_dioxide = self.carbon_dioxide.clone();
        let device = name.to_string();
        subscribe(bus.as_ref(), name, &format!("tele/{name}/SENSOR"), move |message: &Message| {
            let data = match ClimateSensorData::parse(message.payload()) {
                Ok(data) => data,
                Err(e) => {
                    error!(device = %device, error = %e, "Discarding sensor report");
                    return;
                }
            };
            let reading = match data.climate() {
                Ok(reading) => reading,
                Err(e) => {
                    error!(device = %device, error = %e, "Discarding incomplete sensor report");
                    return;
                }
            };

            temperature.set_value(reading.temperature);
            humidity.set_value(reading.humidity);

            if let Some(sensor) = &carbon_dioxide
                && let Some(level) = data.carbon_dioxide()
            {
                apply_carbon_dioxide(sensor, level);
            }
        })
    }
}
