// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shelly dimmer adapter.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use super::{DeviceAdapter, DeviceClass, new_accessory, publish, subscribe, subscribe_liveness};
use crate::accessory::{Accessory, DimmableLightbulb};
use crate::bus::{Bus, Message};
use crate::config::DeviceDescriptor;
use crate::error::Result;
use crate::telemetry::{ShellyStatus, brightness_command, power_command};

/// Adapter for a Shelly dimmer.
///
/// Status reports carry output and brightness together and are applied as
/// one unit. Power and brightness writes from a controller each publish
/// their own command, so turning the light off through both characteristics
/// sends two commands.
#[derive(Debug)]
pub struct ShellyDimmerAdapter {
    descriptor: DeviceDescriptor,
    accessory: Accessory,
    light: DimmableLightbulb,
    status_lock: Arc<Mutex<()>>,
}

impl ShellyDimmerAdapter {
    /// Builds the adapter and its accessory.
    #[must_use]
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        let mut accessory = new_accessory(DeviceClass::ShellyDimmer, id, &descriptor);
        let light = DimmableLightbulb::new();
        accessory.add_service(&light);

        Self {
            descriptor,
            accessory,
            light,
            status_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the lightbulb service.
    #[must_use]
    pub fn light(&self) -> &DimmableLightbulb {
        &self.light
    }

    fn topic(&self, leaf: &str) -> String {
        format!("shellies/{}/{leaf}", self.descriptor.name)
    }
}

impl DeviceAdapter for ShellyDimmerAdapter {
    fn class(&self) -> DeviceClass {
        DeviceClass::ShellyDimmer
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
        subscribe_liveness(bus.as_ref(), name, &self.topic("online"), "false")?;

        let light = self.light.clone();
        let lock = Arc::clone(&self.status_lock);
        let device = name.to_string();
        subscribe(bus.as_ref(), name, &self.topic("status/light:0"), move |message: &Message| {
            let state = match ShellyStatus::parse(message.payload()).and_then(|s| s.state()) {
                Ok(state) => state,
                Err(e) => {
                    error!(device = %device, error = %e, "Discarding status report");
                    return;
                }
            };

            let _guard = lock.lock();
            light.on.set_value(state.on);
            light.brightness.set_value(state.brightness);
        })?;

        let command_topic = self.topic("command/light:0");

        let brightness_bus = Arc::clone(bus);
        let device = name.to_string();
        let topic = command_topic.clone();
        self.light.brightness.on_value_remote_update(move |level| {
            publish(brightness_bus.as_ref(), &device, &topic, brightness_command(*level));
        });

        let power_bus = Arc::clone(bus);
        let device = name.to_string();
        self.light.on.on_value_remote_update(move |on| {
            publish(power_bus.as_ref(), &device, &command_topic, power_command(*on));
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::types::Brightness;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn bound() -> (Arc<MemoryBus>, ShellyDimmerAdapter) {
        let adapter = ShellyDimmerAdapter::new(500, DeviceDescriptor::new("shellydimmer-01"));
        let bus = Arc::new(MemoryBus::new());
        let dyn_bus: Arc<dyn Bus> = bus.clone();
        adapter.bind(&dyn_bus).unwrap();
        (bus, adapter)
    }

    const STATUS: &str = "shellies/shellydimmer-01/status/light:0";

    #[test]
    fn subscriptions() {
        let (bus, _adapter) = bound();
        assert_eq!(
            bus.subscribed_topics(),
            vec!["shellies/shellydimmer-01/online", STATUS]
        );
    }

    #[test]
    fn complete_status_applies_both() {
        let (bus, adapter) = bound();
        bus.inject(STATUS, r#"{"output":true,"brightness":55}"#);
        assert!(adapter.light().on.value());
        assert_eq!(adapter.light().brightness.value().value(), 55);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn partial_status_is_discarded() {
        let (bus, adapter) = bound();
        bus.inject(STATUS, r#"{"output":true}"#);
        bus.inject(STATUS, r#"{"brightness":20}"#);
        bus.inject(STATUS, "garbage");
        bus.inject(STATUS, r#"{"output":true,"brightness":180}"#);
        assert!(!adapter.light().on.value());
        assert_eq!(adapter.light().brightness.value(), Brightness::MIN);
    }

    #[test]
    fn repeated_status_is_idempotent() {
        let (bus, adapter) = bound();
        let changes = Arc::new(AtomicU32::new(0));
        let changes_clone = changes.clone();
        adapter.light().brightness.on_value_changed(move |_| {
            changes_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.inject(STATUS, r#"{"output":true,"brightness":30}"#);
        bus.inject(STATUS, r#"{"output":true,"brightness":30}"#);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.light().brightness.value().value(), 30);
    }

    #[test]
    fn brightness_write_publishes_command() {
        let (bus, adapter) = bound();
        adapter
            .light()
            .brightness
            .remote_update(Brightness::new(70).unwrap());
        adapter.light().brightness.remote_update(Brightness::MIN);

        let published = bus.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].topic, "shellies/shellydimmer-01/command/light:0");
        assert_eq!(published[0].payload_str(), "set,true,70");
        assert_eq!(published[1].payload_str(), "set,false,0");
    }

    #[test]
    fn power_write_publishes_command() {
        let (bus, adapter) = bound();
        adapter.light().on.remote_update(true);
        adapter.light().on.remote_update(false);

        let payloads: Vec<String> = bus
            .published()
            .iter()
            .map(|m| m.payload_str().into_owned())
            .collect();
        assert_eq!(payloads, vec!["set,true", "set,false"]);
    }

    #[test]
    fn turning_off_through_both_characteristics_sends_two_commands() {
        let (bus, adapter) = bound();
        adapter.light().brightness.remote_update(Brightness::MIN);
        adapter.light().on.remote_update(false);
        assert_eq!(bus.published().len(), 2);
    }
}
