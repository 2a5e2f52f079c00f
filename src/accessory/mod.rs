// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accessory-side model: accessories, services and characteristics.
//!
//! This is the surface the device adapters need from a HAP accessory
//! server. The server itself (pairing, persistence, advertisement,
//! controller notifications) lives outside this crate; it reads values,
//! calls [`Characteristic::remote_update`] for controller writes and
//! subscribes to [`Characteristic::on_value_changed`] to push events.

mod characteristic;
mod record;
mod service;

pub use characteristic::{
    CarbonDioxideDetected, Characteristic, CharacteristicType, ContactSensorState, SubscriptionId,
};
pub use record::{Accessory, AccessoryInfo, Category, ServiceSummary};
pub use service::{
    CarbonDioxideSensor, ContactSensor, DimmableLightbulb, HumiditySensor, Lightbulb, Service,
    ServiceType, TemperatureSensor,
};
