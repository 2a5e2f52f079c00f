// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory records handed to the accessory server.

use super::characteristic::CharacteristicType;
use super::service::{Service, ServiceType};

/// HAP accessory category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The bridge accessory aggregating all others.
    Bridge,
    /// A light or switchable outlet.
    Lightbulb,
    /// A sensor.
    Sensor,
}

impl Category {
    /// Returns the HAP category identifier.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Bridge => 2,
            Self::Lightbulb => 5,
            Self::Sensor => 10,
        }
    }
}

/// Accessory information service contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    /// Display name.
    pub name: String,
    /// Model string.
    pub model: String,
    /// Manufacturer, if known.
    pub manufacturer: Option<String>,
}

impl AccessoryInfo {
    /// Creates accessory information without a manufacturer.
    #[must_use]
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            manufacturer: None,
        }
    }

    /// Sets the manufacturer.
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }
}

/// Summary of a service attached to an accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSummary {
    /// The service type.
    pub service_type: ServiceType,
    /// Types of the characteristics it carries.
    pub characteristics: Vec<CharacteristicType>,
}

/// An accessory with a stable identity.
///
/// The identity keys whatever pairing and characteristic state the
/// accessory server persists, so it must not change across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accessory {
    id: u64,
    info: AccessoryInfo,
    category: Category,
    services: Vec<ServiceSummary>,
}

impl Accessory {
    /// Creates an accessory without services.
    #[must_use]
    pub fn new(id: u64, info: AccessoryInfo, category: Category) -> Self {
        Self {
            id,
            info,
            category,
            services: Vec::new(),
        }
    }

    /// Attaches a service.
    pub fn add_service(&mut self, service: &impl Service) {
        self.services.push(ServiceSummary {
            service_type: service.service_type(),
            characteristics: service.characteristic_types(),
        });
    }

    /// Returns the accessory identity.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the accessory information.
    #[must_use]
    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns the category.
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns the attached services in insertion order.
    #[must_use]
    pub fn services(&self) -> &[ServiceSummary] {
        &self.services
    }
}
