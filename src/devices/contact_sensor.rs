// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contact sensor with a freely configured state topic.

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::{DeviceAdapter, DeviceClass, new_accessory, subscribe};
use crate::accessory::{Accessory, ContactSensor, ContactSensorState};
use crate::bus::{Bus, Message};
use crate::config::DeviceDescriptor;
use crate::error::{ConfigError, Result};
use crate::types::PowerState;

/// Adapter for a contact sensor.
///
/// The state topic is the descriptor's first option. `ON` means contact
/// detected, `OFF` means not detected; other payloads are ignored.
#[derive(Debug)]
pub struct ContactSensorAdapter {
    descriptor: DeviceDescriptor,
    accessory: Accessory,
    sensor: ContactSensor,
}

impl ContactSensorAdapter {
    /// Builds the adapter and its accessory.
    #[must_use]
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        let mut accessory = new_accessory(DeviceClass::ContactSensor, id, &descriptor);
        let sensor = ContactSensor::new();
        accessory.add_service(&sensor);

        Self {
            descriptor,
            accessory,
            sensor,
        }
    }

    /// Returns the contact sensor service.
    #[must_use]
    pub fn sensor(&self) -> &ContactSensor {
        &self.sensor
    }

    /// Returns the state topic, if configured.
    #[must_use]
    pub fn state_topic(&self) -> Option<&str> {
        self.descriptor.first_option()
    }
}

impl DeviceAdapter for ContactSensorAdapter {
    fn class(&self) -> DeviceClass {
        DeviceClass::ContactSensor
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
        let topic = self
            .state_topic()
            .ok_or_else(|| ConfigError::MissingOption {
                device: self.descriptor.name.clone(),
                option: "topic".to_string(),
            })?;

        let state = Arc::clone(&self.sensor.state);
        let device = self.descriptor.name.clone();
        subscribe(bus.as_ref(), &self.descriptor.name, topic, move |message: &Message| {
            match PowerState::from_exact(&message.payload_str()) {
                Some(PowerState::On) => {
                    state.set_value(ContactSensorState::Detected);
                }
                Some(PowerState::Off) => {
                    state.set_value(ContactSensorState::NotDetected);
                }
                None => debug!(device = %device, "Ignoring unrecognized contact state"),
            }
        })
    }
}
