// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Eltako EnOcean actuators exposed by FHEM.
//!
//! FHEM mirrors every actuator under `fhem/stat/<name>/...` and accepts
//! commands under `fhem/cmnd/<name>/...`. Payloads are lowercase `on`/`off`
//! tokens and decimal dim levels; inbound tokens are matched
//! case-insensitively. FHEM itself reports `offline` on the shared `fhem`
//! topic.
//!
//! The dimmer never sends `on`: a dim command already switches the light on,
//! and an explicit `on` first drives it to full brightness before the dim
//! level arrives.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, error};

use super::{
    DeviceAdapter, DeviceClass, new_accessory, publish, subscribe, subscribe_liveness,
};
use crate::accessory::{Accessory, Characteristic, DimmableLightbulb, Lightbulb};
use crate::bus::{Bus, Message};
use crate::config::DeviceDescriptor;
use crate::error::Result;
use crate::types::{Brightness, PowerState};

/// Topic on which FHEM reports its own liveness.
pub const LIVENESS_TOPIC: &str = "fhem";

fn stat_topic(name: &str, leaf: &str) -> String {
    format!("fhem/stat/{name}/{leaf}")
}

fn cmnd_topic(name: &str, leaf: &str) -> String {
    format!("fhem/cmnd/{name}/{leaf}")
}

/// Subscribes the liveness topic and the `state` topic shared by both
/// actuator kinds.
fn bind_state(bus: &dyn Bus, name: &str, on: &Arc<Characteristic<bool>>) -> Result<()> {
    subscribe_liveness(bus, name, LIVENESS_TOPIC, "offline")?;

    let on = Arc::clone(on);
    let device = name.to_string();
    subscribe(bus, name, &stat_topic(name, "state"), move |message: &Message| {
        match message.payload_str().trim().parse::<PowerState>() {
            Ok(state) => {
                on.set_value(state.is_on());
            }
            Err(_) => debug!(device = %device, "Ignoring unrecognized power state"),
        }
    })
}

/// Adapter for an Eltako dimmer.
#[derive(Debug)]
pub struct EnOceanDimmerAdapter {
    descriptor: DeviceDescriptor,
    accessory: Accessory,
    light: DimmableLightbulb,
}

impl EnOceanDimmerAdapter {
    /// Builds the adapter and its accessory.
    #[must_use]
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        let mut accessory = new_accessory(DeviceClass::EnOceanDimmer, id, &descriptor);
        let light = DimmableLightbulb::new();
        accessory.add_service(&light);

        Self {
            descriptor,
            accessory,
            light,
        }
    }

    /// Returns the lightbulb service.
    #[must_use]
    pub fn light(&self) -> &DimmableLightbulb {
        &self.light
    }
}

impl DeviceAdapter for EnOceanDimmerAdapter {
    fn class(&self) -> DeviceClass {
        DeviceClass::EnOceanDimmer
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
        bind_state(bus.as_ref(), name, &self.light.on)?;

        let brightness = Arc::clone(&self.light.brightness);
        let device = name.to_string();
        subscribe(bus.as_ref(), name, &stat_topic(name, "dim"), move |message: &Message| {
            match Brightness::parse(&message.payload_str()) {
                Ok(level) => {
                    brightness.set_value(level);
                }
                Err(e) => error!(device = %device, error = %e, "Discarding dim report"),
            }
        })?;

        let state_bus = Arc::clone(bus);
        let device = name.to_string();
        let topic = cmnd_topic(name, "state");
        self.light.on.on_value_remote_update(move |on| {
            if !on {
                publish(state_bus.as_ref(), &device, &topic, PowerState::Off.as_lower_str());
            }
        });

        let dim_bus = Arc::clone(bus);
        let device = name.to_string();
        let topic = cmnd_topic(name, "dim");
        self.light.brightness.on_value_remote_update(move |level| {
            publish(dim_bus.as_ref(), &device, &topic, level.to_string());
        });

        Ok(())
    }
}

/// Adapter for an Eltako switch.
///
/// Unlike the dimmer it publishes both `on` and `off`, as it has no dim
/// command that would imply `on`.
#[derive(Debug)]
pub struct EnOceanLightbulbAdapter {
    descriptor: DeviceDescriptor,
    accessory: Accessory,
    light: Lightbulb,
}

impl EnOceanLightbulbAdapter {
    /// Builds the adapter and its accessory.
    #[must_use]
    pub fn new(id: u64, descriptor: DeviceDescriptor) -> Self {
        let mut accessory = new_accessory(DeviceClass::EnOceanLightbulb, id, &descriptor);
        let light = Lightbulb::new();
        accessory.add_service(&light);

        Self {
            descriptor,
            accessory,
            light,
        }
    }

    /// Returns the lightbulb service.
    #[must_use]
    pub fn light(&self) -> &Lightbulb {
        &self.light
    }
}

impl DeviceAdapter for EnOceanLightbulbAdapter {
    fn class(&self) -> DeviceClass {
        DeviceClass::EnOceanLightbulb
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
        bind_state(bus.as_ref(), name, &self.light.on)?;

        let bus = Arc::clone(bus);
        let device = name.to_string();
        let topic = cmnd_topic(name, "state");
        self.light.on.on_value_remote_update(move |on| {
            let state = PowerState::from(*on);
            publish(bus.as_ref(), &device, &topic, state.as_lower_str());
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;

    fn bind(adapter: &dyn DeviceAdapter) -> Arc<MemoryBus> {
        let bus = Arc::new(MemoryBus::new());
        let dyn_bus: Arc<dyn Bus> = bus.clone();
        adapter.bind(&dyn_bus).unwrap();
        bus
    }

    fn dimmer() -> (Arc<MemoryBus>, EnOceanDimmerAdapter) {
        let adapter = EnOceanDimmerAdapter::new(100, DeviceDescriptor::new("dim1"));
        let bus = bind(&adapter);
        (bus, adapter)
    }

    #[test]
    fn dimmer_subscriptions() {
        let (bus, _adapter) = dimmer();
        assert_eq!(
            bus.subscribed_topics(),
            vec!["fhem", "fhem/stat/dim1/state", "fhem/stat/dim1/dim"]
        );
    }

    #[test]
    fn dimmer_on_is_not_published() {
        let (bus, adapter) = dimmer();
        adapter.light().on.remote_update(true);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn dimmer_off_is_published_once() {
        let (bus, adapter) = dimmer();
        adapter.light().on.remote_update(true);
        adapter.light().on.remote_update(false);

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "fhem/cmnd/dim1/state");
        assert_eq!(published[0].payload_str(), "off");
        assert!(!published[0].retain);
    }

    #[test]
    fn dimmer_brightness_is_always_published() {
        let (bus, adapter) = dimmer();
        let level = Brightness::new(42).unwrap();
        adapter.light().brightness.remote_update(level);
        adapter.light().brightness.remote_update(level);

        let published = bus.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].topic, "fhem/cmnd/dim1/dim");
        assert_eq!(published[0].payload_str(), "42");
    }

    #[test]
    fn dimmer_inbound_state_is_case_insensitive() {
        let (bus, adapter) = dimmer();
        bus.inject("fhem/stat/dim1/state", "ON");
        assert!(adapter.light().on.value());
        bus.inject("fhem/stat/dim1/state", "Off");
        assert!(!adapter.light().on.value());
        bus.inject("fhem/stat/dim1/state", "dim50%");
        assert!(!adapter.light().on.value());
        // No echo of device reports.
        assert!(bus.published().is_empty());
    }

    #[test]
    fn dimmer_inbound_dim() {
        let (bus, adapter) = dimmer();
        bus.inject("fhem/stat/dim1/dim", "64");
        assert_eq!(adapter.light().brightness.value().value(), 64);

        bus.inject("fhem/stat/dim1/dim", "bright");
        bus.inject("fhem/stat/dim1/dim", "250");
        assert_eq!(adapter.light().brightness.value().value(), 64);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn liveness_leaves_state_alone() {
        let (bus, adapter) = dimmer();
        bus.inject("fhem/stat/dim1/state", "on");
        bus.inject("fhem", "offline");
        assert!(adapter.light().on.value());
    }

    #[test]
    fn lightbulb_publishes_both_states() {
        let adapter = EnOceanLightbulbAdapter::new(400, DeviceDescriptor::new("lamp"));
        let bus = bind(&adapter);
        assert_eq!(bus.subscribed_topics(), vec!["fhem", "fhem/stat/lamp/state"]);

        adapter.light().on.remote_update(true);
        adapter.light().on.remote_update(false);

        let payloads: Vec<String> = bus
            .published()
            .iter()
            .map(|m| format!("{} {}", m.topic, m.payload_str()))
            .collect();
        assert_eq!(
            payloads,
            vec!["fhem/cmnd/lamp/state on", "fhem/cmnd/lamp/state off"]
        );
    }

    #[test]
    fn lightbulb_inbound_state() {
        let adapter = EnOceanLightbulbAdapter::new(400, DeviceDescriptor::new("lamp"));
        let bus = bind(&adapter);
        bus.inject("fhem/stat/lamp/state", "on");
        assert!(adapter.light().on.value());
        assert_eq!(adapter.accessory().info().manufacturer.as_deref(), Some("Eltako"));
    }

    #[test]
    fn two_devices_share_liveness_topic() {
        let bus = Arc::new(MemoryBus::new());
        let dyn_bus: Arc<dyn Bus> = bus.clone();
        let a = EnOceanLightbulbAdapter::new(400, DeviceDescriptor::new("a"));
        let b = EnOceanDimmerAdapter::new(100, DeviceDescriptor::new("b"));
        a.bind(&dyn_bus).unwrap();
        b.bind(&dyn_bus).unwrap();
        assert_eq!(bus.inject(LIVENESS_TOPIC, "offline"), 2);
    }
}
