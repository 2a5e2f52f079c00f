// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge configuration.
//!
//! The configuration is a TOML document with three sections: `[hap]` for the
//! accessory server, `[mqtt]` for the broker connection and `[devices]` with
//! one array of tables per device class.
//!
//! # Examples
//!
//! ```
//! use hap_mqtt::config::Config;
//! use hap_mqtt::devices::DeviceClass;
//!
//! let config = Config::from_toml_str(r#"
//!     [mqtt]
//!     broker = "tcp://192.168.1.50:1883"
//!
//!     [[devices.tasmota_plugs]]
//!     name = "plug_kitchen"
//!     friendly_name = "Kitchen"
//!     options = ["POWER2"]
//! "#).unwrap();
//!
//! config.validate().unwrap();
//! let plugs = config.devices.of_class(DeviceClass::TasmotaPlug);
//! assert_eq!(plugs[0].display_name(), "Kitchen");
//! assert_eq!(config.mqtt.client_id, "hap-mqtt");
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bus::parse_broker_url;
use crate::devices::DeviceClass;
use crate::error::ConfigError;

/// Number of identities available to each device class.
pub const MAX_DEVICES_PER_CLASS: usize = 98;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accessory server settings.
    pub hap: HapConfig,
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Configured devices, grouped by class.
    pub devices: DevicesConfig,
}

/// Settings handed to the accessory server.
///
/// The bridge core does not interpret these values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapConfig {
    /// Directory holding pairing state.
    pub db_dir: String,
    /// Network interfaces to advertise on.
    pub ifaces: Vec<String>,
    /// Listen address, e.g. `:51826`.
    pub address: String,
    /// Setup code.
    pub pin: String,
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker URL (`mqtt://host:port`, `tcp://host:port` or `host[:port]`).
    pub broker: String,
    /// Username; credentials are only used when this is non-empty.
    pub username: String,
    /// Password.
    pub password: String,
    /// MQTT client identifier.
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: String::new(),
            username: String::new(),
            password: String::new(),
            client_id: "hap-mqtt".to_string(),
        }
    }
}

impl MqttConfig {
    /// Returns the username and password if a username is configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((&self.username, &self.password))
        }
    }
}

/// Device lists, one per device class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Binary contact sensors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contact_sensors: Vec<DeviceDescriptor>,
    /// Eltako dimmers behind FHEM.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enocean_dimmers: Vec<DeviceDescriptor>,
    /// Eltako switches behind FHEM.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enocean_lightbulbs: Vec<DeviceDescriptor>,
    /// Shelly dimmers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shelly_dimmers: Vec<DeviceDescriptor>,
    /// Tasmota BME280/MH-Z19B sensors.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasmota_climate_sensors: Vec<DeviceDescriptor>,
    /// Tasmota relays.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasmota_plugs: Vec<DeviceDescriptor>,
}

impl DevicesConfig {
    /// Returns the descriptors configured for a class, in file order.
    #[must_use]
    pub fn of_class(&self, class: DeviceClass) -> &[DeviceDescriptor] {
        match class {
            DeviceClass::ContactSensor => &self.contact_sensors,
            DeviceClass::EnOceanDimmer => &self.enocean_dimmers,
            DeviceClass::EnOceanLightbulb => &self.enocean_lightbulbs,
            DeviceClass::ShellyDimmer => &self.shelly_dimmers,
            DeviceClass::TasmotaClimateSensor => &self.tasmota_climate_sensors,
            DeviceClass::TasmotaPlug => &self.tasmota_plugs,
        }
    }

    /// Returns the total number of configured devices.
    #[must_use]
    pub fn len(&self) -> usize {
        DeviceClass::ALL
            .iter()
            .map(|class| self.of_class(*class).len())
            .sum()
    }

    /// Returns `true` if no device is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configuration record of one physical device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device identifier on the bus.
    pub name: String,

    /// Display name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Class-specific positional options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl DeviceDescriptor {
    /// Creates a descriptor with only a bus name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            options: Vec::new(),
        }
    }

    /// Sets the display name override.
    #[must_use]
    pub fn with_friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    /// Appends a positional option.
    #[must_use]
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Returns the display name override, treating an empty one as absent.
    #[must_use]
    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Returns the name shown to controllers.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.friendly_name().unwrap_or(&self.name)
    }

    /// Returns the model string for a class label.
    ///
    /// The bus name is appended when a friendly name hides it.
    ///
    /// ```
    /// use hap_mqtt::config::DeviceDescriptor;
    ///
    /// let plain = DeviceDescriptor::new("plug1");
    /// assert_eq!(plain.model("Plug"), "Plug");
    ///
    /// let named = DeviceDescriptor::new("plug1").with_friendly_name("Desk");
    /// assert_eq!(named.model("Plug"), "Plug (plug1)");
    /// ```
    #[must_use]
    pub fn model(&self, label: &str) -> String {
        if self.friendly_name().is_some() {
            format!("{label} ({})", self.name)
        } else {
            label.to_string()
        }
    }

    /// Returns the first option unless it is missing or empty.
    #[must_use]
    pub fn first_option(&self) -> Option<&str> {
        self.options
            .first()
            .map(String::as_str)
            .filter(|o| !o.is_empty())
    }
}

impl Config {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Decode` if it is not a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses the configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Decode` if the text is not a valid configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(Into::into)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Encode` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(Into::into)
    }

    /// Checks the constraints the bridge relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint: missing or unparseable broker,
    /// a class holding more than [`MAX_DEVICES_PER_CLASS`] devices, an empty
    /// device name or a name used twice within one class.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker.trim().is_empty() {
            return Err(ConfigError::MissingField("mqtt.broker".to_string()));
        }
        parse_broker_url(&self.mqtt.broker)
            .map_err(|e| ConfigError::InvalidBrokerUrl(format!("{}: {e}", self.mqtt.broker)))?;

        for class in DeviceClass::ALL {
            let devices = self.devices.of_class(class);
            if devices.len() > MAX_DEVICES_PER_CLASS {
                return Err(ConfigError::TooManyDevices {
                    class: class.config_key().to_string(),
                    count: devices.len(),
                    max: MAX_DEVICES_PER_CLASS,
                });
            }

            let mut seen = HashSet::new();
            for device in devices {
                if device.name.trim().is_empty() {
                    return Err(ConfigError::MissingField(format!(
                        "devices.{}.name",
                        class.config_key()
                    )));
                }
                if !seen.insert(device.name.as_str()) {
                    return Err(ConfigError::DuplicateDevice {
                        class: class.config_key().to_string(),
                        name: device.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
