// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker connection.
//!
//! [`MqttBus`] wraps a rumqttc client whose event loop runs on a tokio
//! task. Every inbound message is handed to each matching handler on its
//! own blocking task, so handlers run concurrently and may block.
//!
//! [`Bus::publish`] and [`Bus::subscribe`] block the caller until the event
//! loop has accepted the request. They rely on
//! [`tokio::task::block_in_place`] and therefore require the multi-thread
//! runtime.
//!
//! # Examples
//!
//! ```no_run
//! use hap_mqtt::bus::MqttBus;
//!
//! # async fn example() -> Result<(), hap_mqtt::error::ProtocolError> {
//! let bus = MqttBus::builder()
//!     .broker_url("tcp://192.168.1.50:1883")?
//!     .credentials("user", "password")
//!     .client_id("hap-mqtt")
//!     .build()
//!     .await?;
//!
//! assert!(bus.is_connected());
//! bus.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use rumqttc::{AsyncClient, EventLoop, MqttOptions};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::{Bus, Message, MessageHandler, QoS, topic_matches};
use crate::error::ProtocolError;

/// Configuration for an MQTT broker connection.
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    host: String,
    port: u16,
    client_id: String,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    reconnect_delay: Duration,
    request_capacity: usize,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            client_id: "hap-mqtt".to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            request_capacity: 64,
        }
    }
}

struct Subscription {
    filter: String,
    qos: QoS,
    handler: MessageHandler,
}

/// An MQTT broker connection implementing [`Bus`].
///
/// `MqttBus` is cheaply cloneable (via `Arc`).
#[derive(Clone)]
pub struct MqttBus {
    inner: Arc<MqttBusInner>,
}

struct MqttBusInner {
    client: AsyncClient,
    runtime: Handle,
    subscriptions: RwLock<Vec<Subscription>>,
    config: MqttBusConfig,
    connected: AtomicBool,
    closing: AtomicBool,
}

impl MqttBus {
    /// Creates a new builder for configuring an MQTT broker connection.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::default()
    }

    /// Returns whether the broker is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the host address of the broker.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.config.host
    }

    /// Returns the port of the broker.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.config.port
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    /// Disconnects from the broker.
    ///
    /// Inbound messages still queued are dropped; publishes already
    /// accepted are flushed by the event loop before it stops.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );

        self.inner.closing.store(true, Ordering::Release);
        let result = self.inner.client.disconnect().await;
        self.inner.connected.store(false, Ordering::Release);
        result.map_err(ProtocolError::Mqtt)
    }

    /// Runs `future` to completion from synchronous code.
    fn block_on<F: Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| self.inner.runtime.block_on(future))
    }

    /// Hands a message to every matching handler, each on its own task.
    fn dispatch(&self, message: Message) {
        if self.inner.closing.load(Ordering::Acquire) {
            return;
        }

        let handlers: Vec<MessageHandler> = self
            .inner
            .subscriptions
            .read()
            .iter()
            .filter(|sub| topic_matches(&sub.filter, message.topic()))
            .map(|sub| MessageHandler::clone(&sub.handler))
            .collect();

        if handlers.is_empty() {
            tracing::trace!(topic = %message.topic(), "No handler for topic");
            return;
        }

        let message = Arc::new(message);
        for handler in handlers {
            let message = Arc::clone(&message);
            self.inner
                .runtime
                .spawn_blocking(move || handler(&message));
        }
    }

    /// Renews every distinct subscription after a reconnect.
    ///
    /// Runs on its own task while the event loop keeps polling, since the
    /// request queue may hold fewer entries than there are filters.
    async fn resubscribe(&self) {
        let filters: Vec<(String, QoS)> = {
            let subscriptions = self.inner.subscriptions.read();
            let mut filters: Vec<(String, QoS)> = Vec::new();
            for sub in subscriptions.iter() {
                if !filters.iter().any(|(filter, _)| *filter == sub.filter) {
                    filters.push((sub.filter.clone(), sub.qos));
                }
            }
            filters
        };

        for (filter, qos) in filters {
            if let Err(e) = self.inner.client.subscribe(&filter, qos).await {
                tracing::warn!(topic = %filter, error = %e, "Failed to renew subscription");
            }
        }
    }
}

impl Bus for MqttBus {
    fn subscribe(
        &self,
        topic_filter: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), ProtocolError> {
        let already_subscribed = self
            .inner
            .subscriptions
            .read()
            .iter()
            .any(|sub| sub.filter == topic_filter);

        if !already_subscribed {
            let client = self.inner.client.clone();
            let filter = topic_filter.to_string();
            self.block_on(async move { client.subscribe(filter, qos).await })
                .map_err(ProtocolError::Mqtt)?;
            tracing::debug!(topic = %topic_filter, "Subscribed to topic");
        }

        self.inner.subscriptions.write().push(Subscription {
            filter: topic_filter.to_string(),
            qos,
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
        if self.inner.closing.load(Ordering::Acquire) {
            return Err(ProtocolError::PublishRejected {
                topic: topic.to_string(),
                reason: "connection is closing".to_string(),
            });
        }

        let client = self.inner.client.clone();
        let owned_topic = topic.to_string();
        self.block_on(async move { client.publish(owned_topic, qos, retain, payload).await })
            .map_err(ProtocolError::Mqtt)
    }
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Builder for creating an MQTT broker connection.
#[derive(Debug, Default)]
pub struct MqttBusBuilder {
    config: MqttBusConfig,
}

impl MqttBusBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets host and port from a URL such as `tcp://broker:1883`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the URL cannot be parsed.
    pub fn broker_url(mut self, url: &str) -> Result<Self, ProtocolError> {
        let (host, port) = parse_broker_url(url)?;
        self.config.host = host;
        self.config.port = port;
        Ok(self)
    }

    /// Sets the client identifier (default: `hap-mqtt`).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the pause between reconnection attempts (default: 5 seconds).
    #[must_use]
    pub fn reconnect_delay(mut self, duration: Duration) -> Self {
        self.config.reconnect_delay = duration;
        self
    }

    /// Sets the capacity of the client request queue (default: 64).
    #[must_use]
    pub fn request_capacity(mut self, capacity: usize) -> Self {
        self.config.request_capacity = capacity;
        self
    }

    /// Builds and connects to the MQTT broker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - Connection fails
    /// - Connection times out
    pub async fn build(self) -> Result<MqttBus, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let mut mqtt_options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, self.config.request_capacity);

        let bus = MqttBus {
            inner: Arc::new(MqttBusInner {
                client,
                runtime: Handle::current(),
                subscriptions: RwLock::new(Vec::new()),
                config: self.config.clone(),
                connected: AtomicBool::new(false),
                closing: AtomicBool::new(false),
            }),
        };

        let (connack_tx, connack_rx) = oneshot::channel();
        let bus_clone = bus.clone();
        tokio::spawn(async move {
            handle_bus_events(event_loop, bus_clone, connack_tx).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    client_id = %self.config.client_id,
                    "Connected to MQTT broker"
                );
                Ok(bus)
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => {
                bus.inner.closing.store(true, Ordering::Release);
                Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }
}

/// Drives the rumqttc event loop until the bus is closed.
async fn handle_bus_events(
    mut event_loop: EventLoop,
    bus: MqttBus,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Outgoing, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                bus.inner.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                } else {
                    tracing::info!(host = %bus.inner.config.host, "MQTT reconnected");
                    // Subscribe requests queue behind `poll`, so they must not
                    // be awaited from this loop.
                    let bus = bus.clone();
                    tokio::spawn(async move { bus.resubscribe().await });
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    payload = %String::from_utf8_lossy(&publish.payload),
                    "MQTT message received"
                );
                bus.dispatch(Message::new(publish.topic.clone(), publish.payload.to_vec()));
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                bus.inner.connected.store(false, Ordering::Release);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                bus.inner.connected.store(false, Ordering::Release);
                if bus.inner.closing.load(Ordering::Acquire) {
                    break;
                }
                tracing::error!(error = %e, "MQTT connection lost");
                tokio::time::sleep(bus.inner.config.reconnect_delay).await;
            }
        }
    }

    tracing::debug!("MQTT event loop stopped");
}

/// Parses a broker URL into host and port.
///
/// Accepts `mqtt://host:port`, `tcp://host:port` and bare `host[:port]`;
/// the port defaults to 1883.
///
/// # Errors
///
/// Returns `ProtocolError::InvalidAddress` if the host is empty or the port
/// is not a number.
pub fn parse_broker_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            "MQTT broker host is required".to_string(),
        ));
    }

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_default_values() {
        let builder = MqttBusBuilder::default();
        assert_eq!(builder.config.port, 1883);
        assert!(builder.config.host.is_empty());
        assert_eq!(builder.config.client_id, "hap-mqtt");
        assert!(builder.config.credentials.is_none());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(30));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(10));
        assert_eq!(builder.config.reconnect_delay, Duration::from_secs(5));
    }

    #[test]
    fn builder_overrides() {
        let builder = MqttBusBuilder::default()
            .host("mosquitto.lan")
            .port(1884)
            .client_id("hap-mqtt-attic")
            .credentials("hap", "hunter2")
            .keep_alive(Duration::from_secs(60))
            .connection_timeout(Duration::from_secs(3))
            .reconnect_delay(Duration::from_millis(250))
            .request_capacity(16);

        let config = &builder.config;
        assert_eq!((config.host.as_str(), config.port), ("mosquitto.lan", 1884));
        assert_eq!(config.client_id, "hap-mqtt-attic");
        assert_eq!(
            config.credentials,
            Some(("hap".to_string(), "hunter2".to_string()))
        );
        assert_eq!(config.keep_alive, Duration::from_secs(60));
        assert_eq!(config.connection_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.request_capacity, 16);
    }

    #[test]
    fn builder_with_broker_url() {
        let builder = MqttBusBuilder::default()
            .broker_url("tcp://broker.local:1884")
            .unwrap();
        assert_eq!(builder.config.host, "broker.local");
        assert_eq!(builder.config.port, 1884);
    }

    #[tokio::test]
    async fn builder_missing_host_fails() {
        let result = MqttBusBuilder::default().build().await;
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[test]
    fn parse_broker_url_forms() {
        let cases = [
            ("mqtt://10.0.0.2:1883", ("10.0.0.2", 1883)),
            ("tcp://mosquitto.lan:1884", ("mosquitto.lan", 1884)),
            ("tcp://mosquitto.lan/", ("mosquitto.lan", 1883)),
            ("mosquitto.lan", ("mosquitto.lan", 1883)),
        ];
        for (url, (host, port)) in cases {
            assert_eq!(parse_broker_url(url).unwrap(), (host.to_string(), port), "{url}");
        }
    }

    #[test]
    fn parse_broker_url_invalid() {
        assert!(parse_broker_url("broker.local:abc").is_err());
        assert!(parse_broker_url("tcp://").is_err());
        assert!(parse_broker_url("").is_err());
    }
}
