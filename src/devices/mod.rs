// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device adapters.
//!
//! Each adapter translates between one physical device family and an
//! accessory. It builds the accessory from a [`DeviceDescriptor`], then on
//! [`DeviceAdapter::bind`] subscribes to the device's topics (bus to
//! characteristic) and observes controller writes (characteristic to bus).
//!
//! | Class | Inbound | Outbound |
//! |-------|---------|----------|
//! | [`ContactSensorAdapter`] | `options[0]` | - |
//! | [`EnOceanDimmerAdapter`] | `fhem/stat/<name>/state`, `.../dim`, `fhem` | `fhem/cmnd/<name>/state`, `.../dim` |
//! | [`EnOceanLightbulbAdapter`] | `fhem/stat/<name>/state`, `fhem` | `fhem/cmnd/<name>/state` |
//! | [`ShellyDimmerAdapter`] | `shellies/<name>/status/light:0`, `.../online` | `shellies/<name>/command/light:0` |
//! | [`TasmotaClimateSensorAdapter`] | `tele/<name>/SENSOR`, `.../LWT` | - |
//! | [`TasmotaPlugAdapter`] | `stat/<name>/<output>`, `tele/<name>/LWT` | `cmnd/<name>/<output>` |
//!
//! Inbound writes use [`Characteristic::set_value`](crate::accessory::Characteristic::set_value),
//! which never triggers the outbound observers, so device reports are not
//! echoed back to the device.

mod contact_sensor;
mod enocean;
mod shelly_dimmer;
mod tasmota_climate;
mod tasmota_plug;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::accessory::{Accessory, AccessoryInfo, Category};
use crate::bus::{Bus, Message, QoS};
use crate::config::DeviceDescriptor;
use crate::error::{ProtocolError, Result};

pub use contact_sensor::ContactSensorAdapter;
pub use enocean::{EnOceanDimmerAdapter, EnOceanLightbulbAdapter};
pub use shelly_dimmer::ShellyDimmerAdapter;
pub use tasmota_climate::{CO2_ABNORMAL_THRESHOLD, TasmotaClimateSensorAdapter};
pub use tasmota_plug::TasmotaPlugAdapter;

/// Quality of service used for every subscription and publish.
pub const QOS: QoS = QoS::AtLeastOnce;

/// The supported device families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Binary contact sensor reporting `ON`/`OFF` on a configured topic.
    ContactSensor,
    /// Eltako dimmer behind FHEM.
    EnOceanDimmer,
    /// Eltako switch behind FHEM.
    EnOceanLightbulb,
    /// Shelly dimmer (Gen2 light component).
    ShellyDimmer,
    /// Tasmota with BME280 and optional MH-Z19B.
    TasmotaClimateSensor,
    /// Tasmota relay.
    TasmotaPlug,
}

impl DeviceClass {
    /// Every class, in the order adapters are constructed.
    pub const ALL: [Self; 6] = [
        Self::TasmotaPlug,
        Self::EnOceanDimmer,
        Self::TasmotaClimateSensor,
        Self::ContactSensor,
        Self::EnOceanLightbulb,
        Self::ShellyDimmer,
    ];

    /// Returns the first accessory identity of this class.
    #[must_use]
    pub const fn id_base(&self) -> u64 {
        match self {
            Self::TasmotaPlug => 2,
            Self::EnOceanDimmer => 100,
            Self::TasmotaClimateSensor => 200,
            Self::ContactSensor => 300,
            Self::EnOceanLightbulb => 400,
            Self::ShellyDimmer => 500,
        }
    }

    /// Returns the accessory identity of the device at `position` in this
    /// class's configuration list.
    ///
    /// ```
    /// use hap_mqtt::devices::DeviceClass;
    ///
    /// assert_eq!(DeviceClass::TasmotaPlug.identity(0), 2);
    /// assert_eq!(DeviceClass::ContactSensor.identity(3), 303);
    /// ```
    #[must_use]
    pub const fn identity(&self, position: usize) -> u64 {
        self.id_base() + position as u64
    }

    /// Returns the model label.
    #[must_use]
    pub const fn model(&self) -> &'static str {
        match self {
            Self::ContactSensor => "Contact Sensor",
            Self::EnOceanDimmer | Self::ShellyDimmer => "Dimmer",
            Self::EnOceanLightbulb => "Lightbulb",
            Self::TasmotaClimateSensor => "Climate Sensor",
            Self::TasmotaPlug => "Plug",
        }
    }

    /// Returns the manufacturer, if the class has one.
    #[must_use]
    pub const fn manufacturer(&self) -> Option<&'static str> {
        match self {
            Self::ContactSensor => None,
            Self::EnOceanDimmer | Self::EnOceanLightbulb => Some("Eltako"),
            Self::ShellyDimmer => Some("Shelly"),
            Self::TasmotaClimateSensor | Self::TasmotaPlug => Some("Tasmota"),
        }
    }

    /// Returns the accessory category.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::ContactSensor | Self::TasmotaClimateSensor => Category::Sensor,
            _ => Category::Lightbulb,
        }
    }

    /// Returns the key of this class's list in the `[devices]` section.
    #[must_use]
    pub const fn config_key(&self) -> &'static str {
        match self {
            Self::ContactSensor => "contact_sensors",
            Self::EnOceanDimmer => "enocean_dimmers",
            Self::EnOceanLightbulb => "enocean_lightbulbs",
            Self::ShellyDimmer => "shelly_dimmers",
            Self::TasmotaClimateSensor => "tasmota_climate_sensors",
            Self::TasmotaPlug => "tasmota_plugs",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// A translator between one device and its accessory.
pub trait DeviceAdapter: Send + Sync {
    /// Returns the device class.
    fn class(&self) -> DeviceClass;

    /// Returns the accessory built for the device.
    fn accessory(&self) -> &Accessory;

    /// Returns the descriptor the adapter was built from.
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Registers the inbound subscriptions and outbound observers.
    ///
    /// Must be called once per adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is misconfigured or the bus refuses a
    /// subscription. The adapter is then only partially bound.
    fn bind(&self, bus: &Arc<dyn Bus>) -> Result<()>;

    /// Returns the adapter as [`Any`], for downcasting to its concrete type.
    ///
    /// ```
    /// use hap_mqtt::config::DeviceDescriptor;
    /// use hap_mqtt::devices::{DeviceClass, TasmotaPlugAdapter, create_adapter};
    ///
    /// let adapter = create_adapter(DeviceClass::TasmotaPlug, 2, DeviceDescriptor::new("plug1"));
    /// let plug = adapter.as_any().downcast_ref::<TasmotaPlugAdapter>().unwrap();
    /// assert_eq!(plug.output(), "POWER");
    /// ```
    fn as_any(&self) -> &dyn Any;
}

/// Builds the adapter for `descriptor` with accessory identity `id`.
#[must_use]
pub fn create_adapter(
    class: DeviceClass,
    id: u64,
    descriptor: DeviceDescriptor,
) -> Box<dyn DeviceAdapter> {
    match class {
        DeviceClass::ContactSensor => Box::new(ContactSensorAdapter::new(id, descriptor)),
        DeviceClass::EnOceanDimmer => Box::new(EnOceanDimmerAdapter::new(id, descriptor)),
        DeviceClass::EnOceanLightbulb => Box::new(EnOceanLightbulbAdapter::new(id, descriptor)),
        DeviceClass::ShellyDimmer => Box::new(ShellyDimmerAdapter::new(id, descriptor)),
        DeviceClass::TasmotaClimateSensor => {
            Box::new(TasmotaClimateSensorAdapter::new(id, descriptor))
        }
        DeviceClass::TasmotaPlug => Box::new(TasmotaPlugAdapter::new(id, descriptor)),
    }
}

/// Creates the accessory record shared by all adapters.
fn new_accessory(class: DeviceClass, id: u64, descriptor: &DeviceDescriptor) -> Accessory {
    let mut info = AccessoryInfo::new(descriptor.display_name(), descriptor.model(class.model()));
    if let Some(manufacturer) = class.manufacturer() {
        info = info.with_manufacturer(manufacturer);
    }

    info!(id, device = %descriptor.name, name = %info.name, "HAP create accessory");
    Accessory::new(id, info, class.category())
}

/// Subscribes `handler` to `topic`, logging every delivery.
fn subscribe<F>(bus: &dyn Bus, device: &str, topic: &str, handler: F) -> Result<()>
where
    F: Fn(&Message) + Send + Sync + 'static,
{
    let owner = device.to_string();
    bus.subscribe(
        topic,
        QOS,
        Arc::new(move |message: &Message| {
            debug!(
                device = %owner,
                topic = %message.topic(),
                payload = %message.payload_str(),
                "Received message"
            );
            handler(message);
        }),
    )?;
    debug!(device, topic, "Subscribed");
    Ok(())
}

/// Subscribes to a liveness topic that only reports offline status.
fn subscribe_liveness(
    bus: &dyn Bus,
    device: &str,
    topic: &str,
    offline_payload: &'static str,
) -> Result<()> {
    let name = device.to_string();
    subscribe(bus, device, topic, move |message: &Message| {
        if message.payload_str().trim().eq_ignore_ascii_case(offline_payload) {
            info!(device = %name, topic = %message.topic(), "Device offline");
        }
    })
}

/// Publishes a command, reporting transport failures without escalating.
fn publish(bus: &dyn Bus, device: &str, topic: &str, payload: impl Into<String>) {
    let payload = payload.into();
    debug!(device, topic, payload = %payload, "Publishing");
    if let Err(e) = bus.publish(topic, QOS, false, payload.into_bytes()) {
        report_publish_error(device, topic, &e);
    }
}

fn report_publish_error(device: &str, topic: &str, error: &ProtocolError) {
    warn!(device, topic, error = %error, "Publish not accepted");
}
