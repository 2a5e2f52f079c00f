// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message bus facade.
//!
//! Device adapters only need two operations from the bus: subscribe a
//! handler to a topic filter, and publish a payload to a topic. The
//! [`Bus`] trait captures exactly that, so adapters can run against the
//! real broker connection ([`MqttBus`]) or an in-process one
//! ([`MemoryBus`]).
//!
//! # Dispatch requirements
//!
//! Adapters publish from inside characteristic observers and block until
//! the transport accepts the request. Implementations must therefore run
//! message handlers on units that may block, independently of the context
//! that accepts publish requests; a single cooperative executor shared by
//! both would deadlock.

mod memory;
mod mqtt;

use std::borrow::Cow;
use std::sync::Arc;

pub use memory::{MemoryBus, PublishedMessage};
pub use mqtt::{MqttBus, MqttBusBuilder, MqttBusConfig, parse_broker_url};
pub use rumqttc::QoS;

use crate::error::ProtocolError;

/// An inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    payload: Vec<u8>,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the topic the message arrived on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Handler invoked for each message on a subscribed topic.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// The capabilities adapters need from a message bus.
pub trait Bus: Send + Sync {
    /// Registers `handler` for messages whose topic matches `topic_filter`.
    ///
    /// Filters follow MQTT rules, including `+` and `#` wildcards.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the transport refuses the subscription.
    fn subscribe(
        &self,
        topic_filter: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), ProtocolError>;

    /// Publishes `payload` on `topic`.
    ///
    /// Blocks until the transport has accepted the message for delivery.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the transport does not accept the message.
    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ProtocolError>;
}

/// Returns `true` if `topic` matches the MQTT `filter`.
///
/// `+` matches exactly one level, `#` matches the remaining levels
/// (including none) and is only valid as the last level.
///
/// # Examples
///
/// ```
/// use hap_mqtt::bus::topic_matches;
///
/// assert!(topic_matches("tele/+/LWT", "tele/plug/LWT"));
/// assert!(topic_matches("shellies/#", "shellies/dimmer/status/light:0"));
/// assert!(!topic_matches("stat/plug/POWER", "stat/plug/POWER2"));
/// ```
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_topics() {
        assert!(topic_matches("fhem", "fhem"));
        assert!(topic_matches("stat/plug/POWER", "stat/plug/POWER"));
        assert!(!topic_matches("stat/plug/POWER", "stat/plug"));
        assert!(!topic_matches("stat/plug", "stat/plug/POWER"));
    }

    #[test]
    fn single_level_wildcard() {
        assert!(topic_matches("tele/+/LWT", "tele/kitchen/LWT"));
        assert!(!topic_matches("tele/+/LWT", "tele/kitchen/sub/LWT"));
        assert!(!topic_matches("tele/+", "tele"));
    }

    #[test]
    fn multi_level_wildcard() {
        assert!(topic_matches("#", "anything/at/all"));
        assert!(topic_matches("fhem/#", "fhem"));
        assert!(topic_matches("fhem/#", "fhem/stat/lamp/dim"));
        assert!(!topic_matches("fhem/#/dim", "fhem/stat/lamp/dim"));
    }

    #[test]
    fn message_payload_text() {
        let message = Message::new("fhem/stat/lamp/state", b"on".to_vec());
        assert_eq!(message.topic(), "fhem/stat/lamp/state");
        assert_eq!(message.payload(), b"on");
        assert_eq!(message.payload_str(), "on");
    }

    #[test]
    fn message_payload_invalid_utf8_is_lossy() {
        let message = Message::new("t", vec![0x4f, 0xff, 0x4e]);
        assert_eq!(message.payload_str(), "O\u{fffd}N");
    }
}
