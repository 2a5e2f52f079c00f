// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process message bus.
//!
//! [`MemoryBus`] keeps subscriptions and published messages in memory.
//! Injected messages are delivered synchronously on the caller's thread,
//! which makes adapter behaviour deterministic to observe.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{Bus, Message, MessageHandler, QoS, topic_matches};
use crate::error::ProtocolError;

/// A message recorded by [`MemoryBus::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Requested quality of service.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

struct Subscription {
    filter: String,
    handler: MessageHandler,
}

/// An in-process [`Bus`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use hap_mqtt::bus::{Bus, MemoryBus, Message, QoS};
///
/// let bus = MemoryBus::new();
/// bus.subscribe("stat/plug/POWER", QoS::AtLeastOnce, Arc::new(|message: &Message| {
///     assert_eq!(message.payload_str(), "ON");
/// })).unwrap();
///
/// assert_eq!(bus.inject("stat/plug/POWER", "ON"), 1);
///
/// bus.publish("cmnd/plug/POWER", QoS::AtLeastOnce, false, b"OFF".to_vec()).unwrap();
/// assert_eq!(bus.published()[0].payload_str(), "OFF");
/// ```
#[derive(Default)]
pub struct MemoryBus {
    subscriptions: RwLock<Vec<Subscription>>,
    published: Mutex<Vec<PublishedMessage>>,
    reject_publishes: AtomicBool,
}

impl MemoryBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a message to every matching handler.
    ///
    /// Returns the number of handlers invoked.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        let message = Message::new(topic, payload);
        let handlers: Vec<MessageHandler> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| topic_matches(&sub.filter, topic))
            .map(|sub| MessageHandler::clone(&sub.handler))
            .collect();

        for handler in &handlers {
            handler(&message);
        }
        handlers.len()
    }

    /// Returns all messages published so far.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    /// Returns and clears the published messages.
    pub fn take_published(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.published.lock())
    }

    /// Returns the subscribed topic filters in registration order.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscriptions
            .read()
            .iter()
            .map(|sub| sub.filter.clone())
            .collect()
    }

    /// Makes subsequent publishes fail (or succeed again).
    pub fn reject_publishes(&self, reject: bool) {
        self.reject_publishes.store(reject, Ordering::Release);
    }
}

impl Bus for MemoryBus {
    fn subscribe(
        &self,
        topic_filter: &str,
        _qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), ProtocolError> {
        self.subscriptions.write().push(Subscription {
            filter: topic_filter.to_string(),
            handler,
        });
        Ok(())
    }

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        if self.reject_publishes.load(Ordering::Acquire) {
            return Err(ProtocolError::PublishRejected {
                topic: topic.to_string(),
                reason: "memory bus is rejecting publishes".to_string(),
            });
        }

        self.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            qos,
            retain,
            payload,
        });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .field("published", &self.published.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn inject_reaches_matching_handlers_only() {
        let bus = MemoryBus::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        bus.subscribe(
            "tele/+/LWT",
            QoS::AtLeastOnce,
            Arc::new(move |_: &Message| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert_eq!(bus.inject("tele/plug/LWT", "Offline"), 1);
        assert_eq!(bus.inject("tele/plug/STATE", "{}"), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inject_reaches_every_handler_on_shared_topic() {
        let bus = MemoryBus::new();
        bus.subscribe("fhem", QoS::AtLeastOnce, Arc::new(|_: &Message| {}))
            .unwrap();
        bus.subscribe("fhem", QoS::AtLeastOnce, Arc::new(|_: &Message| {}))
            .unwrap();

        assert_eq!(bus.inject("fhem", "offline"), 2);
        assert_eq!(bus.subscribed_topics(), vec!["fhem", "fhem"]);
    }

    #[test]
    fn publish_records_messages() {
        let bus = MemoryBus::new();
        bus.publish("cmnd/plug/POWER", QoS::AtLeastOnce, false, b"ON".to_vec())
            .unwrap();

        let published = bus.take_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "cmnd/plug/POWER");
        assert_eq!(published[0].payload_str(), "ON");
        assert!(!published[0].retain);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn rejected_publish_is_reported() {
        let bus = MemoryBus::new();
        bus.reject_publishes(true);
        let err = bus
            .publish("cmnd/plug/POWER", QoS::AtLeastOnce, false, b"ON".to_vec())
            .unwrap_err();
        assert!(matches!(err, ProtocolError::PublishRejected { .. }));
        assert!(bus.published().is_empty());

        bus.reject_publishes(false);
        assert!(
            bus.publish("cmnd/plug/POWER", QoS::AtLeastOnce, false, b"ON".to_vec())
                .is_ok()
        );
    }
}
