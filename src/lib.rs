// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `hap-mqtt` - a bridge between MQTT home-automation devices and HomeKit
//! accessories.
//!
//! Every configured device gets a device adapter that keeps an accessory's
//! characteristics and the device's MQTT topics in agreement:
//!
//! - inbound messages are decoded and written to characteristics
//! - controller writes to characteristics are encoded and published
//!
//! # Supported Devices
//!
//! - Contact sensors reporting `ON`/`OFF` on a configured topic
//! - Eltako EnOcean dimmers and switches behind FHEM
//! - Shelly dimmers
//! - Tasmota climate sensors (BME280 with optional MH-Z19B)
//! - Tasmota relays, one accessory per output
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hap_mqtt::bridge::Bridge;
//! use hap_mqtt::bus::{Bus, MqttBus};
//! use hap_mqtt::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("data/config.toml")?;
//!     config.validate()?;
//!
//!     let mqtt = MqttBus::builder()
//!         .broker_url(&config.mqtt.broker)?
//!         .client_id(&config.mqtt.client_id)
//!         .build()
//!         .await?;
//!     let bus: Arc<dyn Bus> = Arc::new(mqtt);
//!
//!     let bridge = Bridge::new(&config.devices);
//!     bridge.bind(&bus);
//!
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without a Broker
//!
//! [`bus::MemoryBus`] delivers injected messages synchronously and records
//! publishes:
//!
//! ```
//! use std::sync::Arc;
//!
//! use hap_mqtt::bus::{Bus, MemoryBus};
//! use hap_mqtt::config::DeviceDescriptor;
//! use hap_mqtt::devices::{DeviceAdapter, TasmotaPlugAdapter};
//!
//! let memory = Arc::new(MemoryBus::new());
//! let bus: Arc<dyn Bus> = memory.clone();
//!
//! let plug = TasmotaPlugAdapter::new(2, DeviceDescriptor::new("plug1"));
//! plug.bind(&bus).unwrap();
//!
//! memory.inject("stat/plug1/POWER", "ON");
//! assert!(plug.outlet().on.value());
//!
//! plug.outlet().on.remote_update(false);
//! assert_eq!(memory.published()[0].payload_str(), "OFF");
//! ```

pub mod accessory;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod devices;
pub mod error;
pub mod telemetry;
pub mod types;

pub use bridge::Bridge;
pub use config::{Config, DeviceDescriptor};
pub use devices::{DeviceAdapter, DeviceClass};
pub use error::{ConfigError, Error, ParseError, ProtocolError, Result, ValueError};
pub use types::{Brightness, PowerState};
