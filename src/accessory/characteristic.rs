// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed characteristic values and their observers.
//!
//! A [`Characteristic`] holds one typed value and two observer lists:
//!
//! - remote-update observers, invoked when a controller writes the value
//!   through [`Characteristic::remote_update`]. Device adapters use these
//!   to publish commands on the bus.
//! - change observers, invoked on every actual value change regardless of
//!   its origin. An accessory server uses these to notify controllers.
//!
//! Values written from the bus side with [`Characteristic::set_value`]
//! never reach the remote-update observers, so inbound state never echoes
//! back to the bus.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};

/// Unique identifier for an observer registration.
///
/// IDs are unique within one characteristic's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// The HAP characteristic types the bridge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicType {
    /// Power state of a light or outlet.
    On,
    /// Brightness percentage of a light.
    Brightness,
    /// Contact detected / not detected.
    ContactSensorState,
    /// Temperature in degrees Celsius.
    CurrentTemperature,
    /// Relative humidity in percent.
    CurrentRelativeHumidity,
    /// Carbon dioxide levels normal / abnormal.
    CarbonDioxideDetected,
    /// Carbon dioxide concentration in ppm.
    CarbonDioxideLevel,
    /// Highest carbon dioxide concentration seen, in ppm.
    CarbonDioxidePeakLevel,
}

impl CharacteristicType {
    /// Returns the short form of the HAP type UUID.
    #[must_use]
    pub const fn type_code(&self) -> u16 {
        match self {
            Self::On => 0x25,
            Self::Brightness => 0x08,
            Self::ContactSensorState => 0x6A,
            Self::CurrentTemperature => 0x11,
            Self::CurrentRelativeHumidity => 0x10,
            Self::CarbonDioxideDetected => 0x92,
            Self::CarbonDioxideLevel => 0x93,
            Self::CarbonDioxidePeakLevel => 0x94,
        }
    }
}

/// Contact sensor state as HAP encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContactSensorState {
    /// The contact is closed.
    Detected = 0,
    /// The contact is open.
    #[default]
    NotDetected = 1,
}

/// Carbon dioxide level classification as HAP encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CarbonDioxideDetected {
    /// Levels are normal.
    #[default]
    Normal = 0,
    /// Levels are abnormal.
    Abnormal = 1,
}

/// Observer callback receiving the new value.
type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A typed characteristic value with observers.
///
/// # Thread Safety
///
/// The value and both observer lists sit behind `parking_lot::RwLock`s.
/// Observers are invoked after the value lock is released, so an observer
/// may read the characteristic it observes.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use hap_mqtt::accessory::{Characteristic, CharacteristicType};
///
/// let on = Characteristic::new(CharacteristicType::On, false);
///
/// let seen = Arc::new(AtomicBool::new(false));
/// let seen_clone = Arc::clone(&seen);
/// on.on_value_remote_update(move |value| seen_clone.store(*value, Ordering::SeqCst));
///
/// // Bus-side writes do not reach remote-update observers
/// on.set_value(true);
/// assert!(!seen.load(Ordering::SeqCst));
///
/// // Controller writes do
/// on.remote_update(true);
/// assert!(seen.load(Ordering::SeqCst));
/// ```
pub struct Characteristic<T> {
    kind: CharacteristicType,
    value: RwLock<T>,
    /// Held from commit through change notification, so observers see
    /// values in the order they were stored.
    notify: ReentrantMutex<()>,
    next_id: AtomicU64,
    remote_observers: RwLock<HashMap<SubscriptionId, Observer<T>>>,
    change_observers: RwLock<HashMap<SubscriptionId, Observer<T>>>,
}

impl<T> Characteristic<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a characteristic holding `initial`.
    #[must_use]
    pub fn new(kind: CharacteristicType, initial: T) -> Self {
        Self {
            kind,
            value: RwLock::new(initial),
            notify: ReentrantMutex::new(()),
            next_id: AtomicU64::new(1),
            remote_observers: RwLock::new(HashMap::new()),
            change_observers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the characteristic type.
    #[must_use]
    pub fn kind(&self) -> CharacteristicType {
        self.kind
    }

    /// Returns a copy of the current value.
    #[must_use]
    pub fn value(&self) -> T {
        self.value.read().clone()
    }

    /// Sets the value from the accessory side.
    ///
    /// Change observers run if the value differs from the previous one.
    /// Remote-update observers never run. Returns `true` if the value
    /// changed.
    pub fn set_value(&self, value: T) -> bool {
        self.update(|_| Some(value))
    }

    /// Conditionally replaces the value under the write lock.
    ///
    /// `f` receives the current value and returns the replacement, or
    /// `None` to keep it. The read-compare-write sequence is exclusive, so
    /// concurrent callers cannot lose an update. Change observers run
    /// after the write lock is released but before any later write is
    /// committed, so they observe changes in commit order. Returns `true`
    /// if the value changed.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> Option<T>,
    {
        let _notify = self.notify.lock();
        let changed = {
            let mut guard = self.value.write();
            match f(&guard) {
                Some(next) if next != *guard => {
                    *guard = next.clone();
                    Some(next)
                }
                _ => None,
            }
        };

        match changed {
            Some(value) => {
                self.notify_changed(&value);
                true
            }
            None => false,
        }
    }

    /// Applies a write requested by a controller.
    ///
    /// Stores the value, runs change observers if it differs, then runs
    /// every remote-update observer synchronously, whether or not the value
    /// changed.
    pub fn remote_update(&self, value: T) {
        {
            let _notify = self.notify.lock();
            let changed = {
                let mut guard = self.value.write();
                let changed = *guard != value;
                *guard = value.clone();
                changed
            };

            if changed {
                self.notify_changed(&value);
            }
        }

        let observers: Vec<Observer<T>> = self.remote_observers.read().values().cloned().collect();
        for observer in observers {
            observer(&value);
        }
    }

    /// Registers a callback for controller-initiated writes.
    pub fn on_value_remote_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.remote_observers.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for every value change.
    pub fn on_value_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.change_observers.write().insert(id, Arc::new(callback));
        id
    }

    /// Removes an observer by its subscription ID.
    ///
    /// Returns `true` if an observer was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.remote_observers.write().remove(&id).is_some()
            || self.change_observers.write().remove(&id).is_some()
    }

    /// Returns the number of registered remote-update observers.
    #[must_use]
    pub fn remote_observer_count(&self) -> usize {
        self.remote_observers.read().len()
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn notify_changed(&self, value: &T) {
        let observers: Vec<Observer<T>> = self.change_observers.read().values().cloned().collect();
        for observer in observers {
            observer(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Characteristic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("kind", &self.kind)
            .field("value", &*self.value.read())
            .field("remote_observers", &self.remote_observers.read().len())
            .field("change_observers", &self.change_observers.read().len())
            .finish()
    }
}
