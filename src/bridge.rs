// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge assembly: identities, adapters and binding.

use std::sync::Arc;

use tracing::{error, info};

use crate::accessory::{Accessory, AccessoryInfo, Category};
use crate::bus::Bus;
use crate::config::DevicesConfig;
use crate::devices::{DeviceAdapter, DeviceClass, create_adapter};

/// Identity of the bridge accessory itself.
pub const BRIDGE_ACCESSORY_ID: u64 = 1;

/// Name of the bridge accessory.
pub const BRIDGE_NAME: &str = "hap-mqtt";

/// The bridge accessory and the adapters of every configured device.
///
/// Each device gets the identity `base(class) + position`, where position
/// is the device's index in its class's configuration list. Identities thus
/// stay stable across restarts as long as the configuration order does.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use hap_mqtt::bridge::Bridge;
/// use hap_mqtt::bus::{Bus, MemoryBus};
/// use hap_mqtt::config::{DeviceDescriptor, DevicesConfig};
///
/// let devices = DevicesConfig {
///     tasmota_plugs: vec![DeviceDescriptor::new("plug1"), DeviceDescriptor::new("plug2")],
///     ..Default::default()
/// };
///
/// let bridge = Bridge::new(&devices);
/// let ids: Vec<u64> = bridge.accessories().map(|a| a.id()).collect();
/// assert_eq!(ids, vec![1, 2, 3]);
///
/// let bus: Arc<dyn Bus> = Arc::new(MemoryBus::new());
/// assert_eq!(bridge.bind(&bus), 2);
/// ```
pub struct Bridge {
    accessory: Accessory,
    adapters: Vec<Box<dyn DeviceAdapter>>,
}

impl Bridge {
    /// Builds the adapters for every configured device.
    #[must_use]
    pub fn new(devices: &DevicesConfig) -> Self {
        let accessory = Accessory::new(
            BRIDGE_ACCESSORY_ID,
            AccessoryInfo::new(BRIDGE_NAME, BRIDGE_NAME),
            Category::Bridge,
        );

        let adapters = DeviceClass::ALL
            .iter()
            .flat_map(|&class| {
                devices
                    .of_class(class)
                    .iter()
                    .enumerate()
                    .map(move |(position, descriptor)| {
                        create_adapter(class, class.identity(position), descriptor.clone())
                    })
            })
            .collect();

        Self {
            accessory,
            adapters,
        }
    }

    /// Binds every adapter to `bus`.
    ///
    /// A device that fails to bind is logged and skipped; the others are
    /// still bound. Returns the number of successfully bound devices.
    pub fn bind(&self, bus: &Arc<dyn Bus>) -> usize {
        let mut bound = 0;
        for adapter in &self.adapters {
            let accessory = adapter.accessory();
            match adapter.bind(bus) {
                Ok(()) => bound += 1,
                Err(e) => error!(
                    id = accessory.id(),
                    device = %adapter.descriptor().name,
                    class = %adapter.class(),
                    error = %e,
                    "Failed to bind device"
                ),
            }
        }

        info!(bound, configured = self.adapters.len(), "Bridge bound");
        bound
    }

    /// Returns the bridge accessory.
    #[must_use]
    pub fn bridge_accessory(&self) -> &Accessory {
        &self.accessory
    }

    /// Returns the bridge accessory followed by every device accessory.
    pub fn accessories(&self) -> impl Iterator<Item = &Accessory> {
        std::iter::once(&self.accessory).chain(self.adapters.iter().map(|a| a.accessory()))
    }

    /// Returns the device adapters in construction order.
    #[must_use]
    pub fn adapters(&self) -> &[Box<dyn DeviceAdapter>] {
        &self.adapters
    }

    /// Returns the adapter owning accessory `id`.
    #[must_use]
    pub fn adapter(&self, id: u64) -> Option<&dyn DeviceAdapter> {
        self.adapters
            .iter()
            .find(|a| a.accessory().id() == id)
            .map(AsRef::as_ref)
    }

    /// Returns the number of device adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns `true` if no device is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("accessory", &self.accessory)
            .field("adapters", &self.adapters.len())
            .finish()
    }
}
