// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tasmota relay adapter.

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::{DeviceAdapter, DeviceClass, new_accessory, publish, subscribe, subscribe_liveness};
use crate::accessory::{Accessory, Lightbulb};
use crate::bus::{Bus, Message};
use crate::config::DeviceDescriptor;
use crate::error::Result;
use crate::types::PowerState;

/// Relay output used when the descriptor does not select one.
pub const DEFAULT_OUTPUT: &str = "POWER";

/// Adapter for one output of a Tasmota relay.
///
/// Multi-relay devices are configured once per output, with the output
/// (`POWER1`, `POWER2`, ...) as the first option.
///
/// # Examples
///
/// ```
/// use hap_mqtt::config::DeviceDescriptor;
/// use hap_mqtt::devices::TasmotaPlugAdapter;
///
/// let plug = TasmotaPlugAdapter::new(2, DeviceDescriptor::new("strip").with_option("POWER2"));
/// assert_eq!(plug.state_topic(), "stat/strip/POWER2");
/// assert_eq!(plug.command_topic(), "cmnd/strip/POWER2");
/// ```
#[derive(Debug)]
pub struct TasmotaPlugAdapter {
    descriptor: DeviceDescriptor,
    accessory: Accessory,
    outlet: Lightbulb,
}

impl TasmotaPlugAdapter {
    /// Builds the adapter and its accessory.
    #[must_use]
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        let mut accessory = new_accessory(DeviceClass::TasmotaPlug, id, &descriptor);
        let outlet = Lightbulb::new();
        accessory.add_service(&outlet);

        Self {
            descriptor,
            accessory,
            outlet,
        }
    }

    /// Returns the switch service.
    #[must_use]
    pub fn outlet(&self) -> &Lightbulb {
        &self.outlet
    }

    /// Returns the selected relay output.
    #[must_use]
    pub fn output(&self) -> &str {
        self.descriptor.first_option().unwrap_or(DEFAULT_OUTPUT)
    }

    /// Returns the topic the relay reports its state on.
    #[must_use]
    pub fn state_topic(&self) -> String {
        format!("stat/{}/{}", self.descriptor.name, self.output())
    }

    /// Returns the topic the relay accepts commands on.
    #[must_use]
    pub fn command_topic(&self) -> String {
        format!("cmnd/{}/{}", self.descriptor.name, self.output())
    }
}

impl DeviceAdapter for TasmotaPlugAdapter {
    fn class(&self) -> DeviceClass {
        DeviceClass::TasmotaPlug
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

        let on = Arc::clone(&self.outlet.on);
        let device = name.to_string();
        subscribe(bus.as_ref(), name, &self.state_topic(), move |message: &Message| {
            match PowerState::from_exact(&message.payload_str()) {
                Some(state) => {
                    on.set_value(state.is_on());
                }
                None => debug!(device = %device, "Ignoring unrecognized power state"),
            }
        })?;

        let bus = Arc::clone(bus);
        let device = name.to_string();
        let topic = self.command_topic();
        self.outlet.on.on_value_remote_update(move |on| {
            publish(bus.as_ref(), &device, &topic, PowerState::from(*on).as_str());
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;

    fn bound(descriptor: DeviceDescriptor) -> (Arc<MemoryBus>, TasmotaPlugAdapter) {
        let adapter = TasmotaPlugAdapter::new(2, descriptor);
        let bus = Arc::new(MemoryBus::new());
        let dyn_bus: Arc<dyn Bus> = bus.clone();
        adapter.bind(&dyn_bus).unwrap();
        (bus, adapter)
    }

    #[test]
    fn default_output() {
        let (bus, adapter) = bound(DeviceDescriptor::new("plug1"));
        assert_eq!(adapter.output(), "POWER");
        assert_eq!(bus.subscribed_topics(), vec!["tele/plug1/LWT", "stat/plug1/POWER"]);
    }

    #[test]
    fn empty_option_falls_back_to_default() {
        let adapter = TasmotaPlugAdapter::new(2, DeviceDescriptor::new("plug1").with_option(""));
        assert_eq!(adapter.output(), "POWER");
    }

    #[test]
    fn selected_output() {
        let (bus, adapter) = bound(DeviceDescriptor::new("strip").with_option("POWER2"));
        assert!(bus.subscribed_topics().contains(&"stat/strip/POWER2".to_string()));

        bus.inject("stat/strip/POWER", "ON");
        assert!(!adapter.outlet().on.value());
        bus.inject("stat/strip/POWER2", "ON");
        assert!(adapter.outlet().on.value());

        adapter.outlet().on.remote_update(false);
        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "cmnd/strip/POWER2");
        assert_eq!(published[0].payload_str(), "OFF");
    }

    #[test]
    fn inbound_is_case_sensitive() {
        let (bus, adapter) = bound(DeviceDescriptor::new("plug1"));
        bus.inject("stat/plug1/POWER", "on");
        assert!(!adapter.outlet().on.value());
        bus.inject("stat/plug1/POWER", "ON");
        assert!(adapter.outlet().on.value());
        bus.inject("stat/plug1/POWER", "TOGGLE");
        assert!(adapter.outlet().on.value());
        assert!(bus.published().is_empty());
    }

    #[test]
    fn every_write_is_published() {
        let (bus, adapter) = bound(DeviceDescriptor::new("plug1"));
        adapter.outlet().on.remote_update(true);
        adapter.outlet().on.remote_update(true);
        adapter.outlet().on.remote_update(false);

        let payloads: Vec<String> = bus
            .published()
            .iter()
            .map(|m| m.payload_str().into_owned())
            .collect();
        assert_eq!(payloads, vec!["ON", "ON", "OFF"]);
        assert!(bus.published().iter().all(|m| m.topic == "cmnd/plug1/POWER"));
    }

    #[test]
    fn liveness_only_logs() {
        let (bus, adapter) = bound(DeviceDescriptor::new("plug1"));
        bus.inject("stat/plug1/POWER", "ON");
        bus.inject("tele/plug1/LWT", "Offline");
        assert!(adapter.outlet().on.value());
    }

    #[test]
    fn publish_failure_keeps_value() {
        let (bus, adapter) = bound(DeviceDescriptor::new("plug1"));
        bus.reject_publishes(true);
        adapter.outlet().on.remote_update(true);
        assert!(adapter.outlet().on.value());
        assert!(bus.published().is_empty());
    }
}
