// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT bus using mockforge-mqtt.
//!
//! `MqttBus` blocks inside `block_in_place`, so every test runs on the
//! multi-thread runtime.

use std::sync::Arc;
use std::time::Duration;

use hap_mqtt::bridge::Bridge;
use hap_mqtt::bus::{Bus, Message, MqttBus, QoS};
use hap_mqtt::config::{DeviceDescriptor, DevicesConfig};
use hap_mqtt::devices::{DeviceAdapter, TasmotaPlugAdapter};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

async fn connect(url: &str) -> MqttBus {
    MqttBus::builder()
        .broker_url(url)
        .unwrap()
        .build()
        .await
        .unwrap()
}

/// TCP relay in front of the broker whose connections can be cut.
struct Relay {
    port: u16,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Relay {
    async fn start(broker_port: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(Mutex::new(Vec::new()));

        let tracked = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((mut inbound, _)) = listener.accept().await {
                let handle = tokio::spawn(async move {
                    if let Ok(mut outbound) = TcpStream::connect(("127.0.0.1", broker_port)).await {
                        let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                    }
                });
                tracked.lock().push(handle);
            }
        });

        Self { port, connections }
    }

    /// Drops every relayed connection.
    fn cut(&self) {
        for handle in self.connections.lock().drain(..) {
            handle.abort();
        }
    }
}

mod connection {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_with_mqtt_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let bus = connect(&format!("mqtt://127.0.0.1:{port}")).await;
        assert!(bus.is_connected());
        assert_eq!(bus.host(), "127.0.0.1");
        assert_eq!(bus.port(), port);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_with_tcp_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let bus = connect(&format!("tcp://127.0.0.1:{port}")).await;
        assert!(bus.is_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connect_without_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let bus = connect(&format!("127.0.0.1:{port}")).await;
        assert!(bus.is_connected());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_broker_fails() {
        let port = get_test_port();
        let result = MqttBus::builder()
            .host("127.0.0.1")
            .port(port)
            .connection_timeout(Duration::from_secs(1))
            .reconnect_delay(Duration::from_millis(100))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_host_fails() {
        let result = MqttBus::builder().build().await;
        assert!(result.is_err());
    }
}

mod requests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribe_and_publish_are_accepted() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let bus = connect(&format!("mqtt://127.0.0.1:{port}")).await;

        bus.subscribe("tele/+/LWT", QoS::AtLeastOnce, Arc::new(|_: &Message| {}))
            .unwrap();
        bus.subscribe("tele/+/LWT", QoS::AtLeastOnce, Arc::new(|_: &Message| {}))
            .unwrap();
        assert_eq!(bus.subscription_count(), 2);

        bus.publish("cmnd/plug/POWER", QoS::AtLeastOnce, false, b"ON".to_vec())
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publish_from_blocking_thread() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let bus = connect(&format!("mqtt://127.0.0.1:{port}")).await;

        let result = tokio::task::spawn_blocking(move || {
            bus.publish("fhem/cmnd/dim1/dim", QoS::AtLeastOnce, false, b"42".to_vec())
        })
        .await
        .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn publish_after_disconnect_is_rejected() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let bus = connect(&format!("mqtt://127.0.0.1:{port}")).await;

        bus.disconnect().await.unwrap();
        assert!(!bus.is_connected());
        assert!(
            bus.publish("cmnd/plug/POWER", QoS::AtLeastOnce, false, b"OFF".to_vec())
                .is_err()
        );
    }
}

mod bridge {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn bridge_binds_against_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let mqtt = Arc::new(connect(&format!("mqtt://127.0.0.1:{port}")).await);
        let bus: Arc<dyn Bus> = mqtt.clone();

        let devices = DevicesConfig {
            tasmota_plugs: vec![DeviceDescriptor::new("plug1")],
            enocean_dimmers: vec![DeviceDescriptor::new("dim1"), DeviceDescriptor::new("dim2")],
            ..Default::default()
        };
        let bridge = Bridge::new(&devices);
        assert_eq!(bridge.bind(&bus), 3);

        // The shared `fhem` filter is registered once per dimmer.
        assert_eq!(mqtt.subscription_count(), 2 + 3 * 2);

        let plug = bridge.adapter(2).unwrap();
        assert_eq!(plug.descriptor().name, "plug1");
    }
}

mod round_trip {
    use super::*;

    async fn device_client(port: u16) -> MqttBus {
        MqttBus::builder()
            .host("127.0.0.1")
            .port(port)
            .client_id("plug1-firmware")
            .build()
            .await
            .unwrap()
    }

    async fn bound_plug(port: u16) -> Arc<TasmotaPlugAdapter> {
        let mqtt = connect(&format!("mqtt://127.0.0.1:{port}")).await;
        let bus: Arc<dyn Bus> = Arc::new(mqtt);
        let plug = Arc::new(TasmotaPlugAdapter::new(2, DeviceDescriptor::new("plug1")));
        plug.bind(&bus).unwrap();
        plug
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn device_report_reaches_characteristic() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let plug = bound_plug(port).await;
        let device = device_client(port).await;
        sleep(Duration::from_millis(300)).await;

        device
            .publish("stat/plug1/POWER", QoS::AtLeastOnce, false, b"ON".to_vec())
            .unwrap();

        let turned_on = timeout(Duration::from_secs(3), async {
            while !plug.outlet().on.value() {
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(turned_on.is_ok(), "plug never saw the ON report");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn controller_write_reaches_device() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let plug = bound_plug(port).await;

        let device = device_client(port).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        device
            .subscribe(
                "cmnd/plug1/POWER",
                QoS::AtLeastOnce,
                Arc::new(move |m: &Message| {
                    let _ = tx.send(m.payload_str().into_owned());
                }),
            )
            .unwrap();
        sleep(Duration::from_millis(300)).await;

        let writer = Arc::clone(&plug);
        tokio::task::spawn_blocking(move || writer.outlet().on.remote_update(true))
            .await
            .unwrap();

        let payload = timeout(Duration::from_secs(3), rx.recv()).await.unwrap();
        assert_eq!(payload.as_deref(), Some("ON"));
    }
}

mod reconnect {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn resubscribing_more_filters_than_request_capacity() {
        let port = get_test_port();
        start_mock_broker(port).await;
        let relay = Relay::start(port).await;

        let bus = MqttBus::builder()
            .host("127.0.0.1")
            .port(relay.port)
            .request_capacity(8)
            .reconnect_delay(Duration::from_millis(200))
            .build()
            .await
            .unwrap();
        for i in 0..40 {
            bus.subscribe(
                &format!("stat/plug{i}/POWER"),
                QoS::AtLeastOnce,
                Arc::new(|_: &Message| {}),
            )
            .unwrap();
        }

        relay.cut();
        sleep(Duration::from_secs(2)).await;

        let publisher = bus.clone();
        let published = timeout(
            Duration::from_secs(3),
            tokio::task::spawn_blocking(move || {
                publisher.publish("cmnd/plug0/POWER", QoS::AtLeastOnce, false, b"ON".to_vec())
            }),
        )
        .await;
        assert!(published.is_ok(), "event loop stalled after reconnect");
        assert!(published.unwrap().unwrap().is_ok());
        assert!(bus.is_connected());
    }
}
