//! Multi-component end-to-end test: feeding ten consecutive CRC-mutilated
//! frames at a `Connection` trips the invalid-response ceiling and tears the
//! connection down, per the specification's testable property 7.

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use voltronic_bridge::config::{Config, ConfigWrapper, InverterConfig, MqttConfig};
use voltronic_bridge::connection::Connection;
use voltronic_bridge::frame::{self, PREAMBLE_INQUIRY};
use voltronic_bridge::mqtt::Mqtt;

fn test_config() -> ConfigWrapper {
    ConfigWrapper::from_config(Config {
        mqtt: MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            topic: "voltronic".to_string(),
        },
        inverter: InverterConfig {
            listen_address: "0.0.0.0".to_string(),
            port: 502,
            known_serials: vec![],
        },
        loglevel: "info".to_string(),
    })
}

fn corrupted_frame() -> Vec<u8> {
    let mut frame = frame::encode(1, PREAMBLE_INQUIRY, b"QPI");
    let crc_offset = frame.len() - 3;
    frame[crc_offset] ^= 0xFF;
    frame
}

#[tokio::test(flavor = "multi_thread")]
async fn ten_mutilated_crc_frames_tear_down_the_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut inverter_side = TcpStream::connect(addr).await.unwrap();
    let (accepted, peer) = listener.accept().await.unwrap();

    let (mqtt, _eventloop) = Mqtt::new(test_config());
    let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let conn = Connection::new(accepted, peer, mqtt, test_config(), shutdown_rx);
    let handle = tokio::spawn(conn.run());

    for _ in 0..10 {
        inverter_side.write_all(&corrupted_frame()).await.unwrap();
    }

    // The engine sleeps 10s once the ceiling trips before closing, so allow
    // comfortably more than that before declaring the test a failure.
    tokio::time::timeout(Duration::from_secs(15), handle)
        .await
        .expect("connection should have torn itself down")
        .expect("connection task should not panic");
}
