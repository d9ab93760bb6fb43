//! Connection worker (C4): owns one inbound TCP socket, drives the query
//! engine, and bridges decoded replies/commands to the MQTT facade.

use crate::catalog::{ChargerSourcePriority, DecodedReply, OutputSourcePriority, QueryKind};
use crate::frame::{self, Decoded};
use crate::mqtt::{IncomingCommand, Mqtt};
use crate::prelude::*;
use crate::query::Engine;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const READ_DEADLINE: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 4096;

/// One accepted inverter connection. Single cooperative loop; no shared
/// mutable state with other connections except the MQTT facade, accessed
/// only through its own registration/publish API.
pub struct Connection {
    socket: TcpStream,
    peer: SocketAddr,
    mqtt: Mqtt,
    config: ConfigWrapper,
    engine: Engine,
    recv_buf: Vec<u8>,
    registered_serial: Option<Serial>,
    commands_rx: mpsc::UnboundedReceiver<IncomingCommand>,
    commands_tx: mpsc::UnboundedSender<IncomingCommand>,
    shutdown: broadcast::Receiver<()>,
}

impl Connection {
    pub fn new(
        socket: TcpStream,
        peer: SocketAddr,
        mqtt: Mqtt,
        config: ConfigWrapper,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            socket,
            peer,
            mqtt,
            config,
            engine: Engine::new(),
            recv_buf: Vec::new(),
            registered_serial: None,
            commands_rx,
            commands_tx,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("{}: accepted", self.peer);
        if let Err(e) = self.drive().await {
            warn!("{}: closing: {}", self.peer, e);
        }
        if let Some(serial) = self.registered_serial.take() {
            self.mqtt.unregister(&format!("{serial}/command"));
        }
        let _ = self.socket.shutdown().await;
        info!("{}: closed", self.peer);
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            if self.shutdown.try_recv().is_ok() {
                return Ok(());
            }

            self.drain_commands();

            let now = Instant::now();
            self.engine.tick(now);

            match self.engine.next_to_transmit(now) {
                Some(tx) => {
                    let frame = frame::encode(tx.counter, tx.preamble, &tx.payload);
                    self.socket.write_all(&frame).await?;
                }
                None => self.engine.gc(now),
            }

            let mut chunk = [0u8; READ_CHUNK];
            match tokio::time::timeout(READ_DEADLINE, self.socket.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    info!("{}: peer disconnected", self.peer);
                    return Ok(());
                }
                Ok(Ok(n)) => self.recv_buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => bail!("connection.rs:socket read error: {}", e),
                Err(_) => {} // read deadline elapsed, nothing to do
            }

            if self.process_buffer().await? {
                return Ok(());
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands_rx.try_recv() {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: IncomingCommand) {
        match cmd.topic_suffix.as_str() {
            "set_output_priority" => match OutputSourcePriority::from_name(cmd.payload.trim()) {
                Some(p) => {
                    info!("{}: queuing set_output_priority {}", self.peer, p.name());
                    self.engine.enqueue_setting(QueryKind::SetOutputPriority(p));
                }
                None => warn!("{}: unknown output priority {:?}", self.peer, cmd.payload),
            },
            "set_charge_priority" => match ChargerSourcePriority::from_name(cmd.payload.trim()) {
                Some(p) => {
                    info!("{}: queuing set_charge_priority {}", self.peer, p.name());
                    self.engine.enqueue_setting(QueryKind::SetChargerPriority(p));
                }
                None => warn!("{}: unknown charger priority {:?}", self.peer, cmd.payload),
            },
            other => warn!("{}: unhandled command topic suffix {:?}", self.peer, other),
        }
    }

    /// Drains all fully-decoded frames from the receive buffer. Returns
    /// `true` if the connection should be torn down (invalid-response
    /// ceiling reached).
    async fn process_buffer(&mut self) -> Result<bool> {
        loop {
            match frame::decode(&self.recv_buf) {
                Decoded::NeedMore => return Ok(false),
                Decoded::Frame {
                    counter,
                    payload,
                    consumed,
                } => {
                    self.recv_buf.drain(..consumed);
                    if self.handle_frame(counter, &payload).await? {
                        return Ok(true);
                    }
                }
                Decoded::Invalid { consumed } | Decoded::Desynced { consumed } => {
                    self.recv_buf.drain(..consumed);
                    if self.trip_invalid().await {
                        return Ok(true);
                    }
                }
            }
        }
    }

    async fn trip_invalid(&mut self) -> bool {
        if self.engine.record_invalid() {
            warn!(
                "{}: invalid-response ceiling reached, settling for 10s before closing",
                self.peer
            );
            tokio::time::sleep(Duration::from_secs(10)).await;
            true
        } else {
            false
        }
    }

    /// Correlates `counter` to an outstanding query and dispatches the
    /// decoded reply. Returns `true` if the ceiling tripped while decoding.
    async fn handle_frame(&mut self, counter: u16, payload: &[u8]) -> Result<bool> {
        let Some(kind) = self.engine.correlate(counter) else {
            debug!("{}: unmatched reply counter {:#06x}, ignoring", self.peer, counter);
            return Ok(false);
        };

        match crate::catalog::decode_reply(&kind, payload) {
            Ok(reply) => {
                self.dispatch_reply(kind, reply).await?;
                Ok(false)
            }
            Err(e) => {
                warn!("{}: invalid reply to {:?}: {}", self.peer, kind, e);
                Ok(self.trip_invalid().await)
            }
        }
    }

    async fn dispatch_reply(&mut self, kind: QueryKind, reply: DecodedReply) -> Result<()> {
        match reply {
            DecodedReply::Nak => warn!("{}: NAK in reply to {:?}", self.peer, kind),
            DecodedReply::Ack => info!("{}: setting acknowledged ({:?})", self.peer, kind),
            DecodedReply::ProtocolVersion(v) => {
                info!("{}: protocol version {}", self.peer, v);
                self.engine.discovered.protocol_version = Some(v);
            }
            DecodedReply::Serial(serial) => self.on_serial_discovered(serial).await?,
            DecodedReply::Firmware { bank, version } => {
                self.engine.discovered.firmware_versions.insert(bank, version.clone());
                self.publish_keyed(&format!("firmware_version{}", bank.topic_suffix()), version)
                    .await?;
            }
            DecodedReply::Ratings(ratings) => {
                for (field, value) in ratings.publish_fields() {
                    self.publish_keyed(field, value).await?;
                }
            }
            DecodedReply::Flags(flags) => debug!("{}: flags {}", self.peer, flags.raw),
            DecodedReply::Telemetry(telemetry) => {
                for (field, value) in telemetry.publish_fields() {
                    self.publish_keyed(field, value).await?;
                }
            }
            DecodedReply::Mode(mode) => self.publish_keyed("mode", mode.as_str().into_owned()).await?,
            DecodedReply::Warnings(warnings) => debug!("{}: warnings {}", self.peer, warnings.raw),
        }
        Ok(())
    }

    async fn on_serial_discovered(&mut self, serial: String) -> Result<()> {
        let serial = Serial::new(serial);
        info!("{}: discovered serial {}", self.peer, serial);
        self.engine.discovered.serial = Some(serial.to_string());

        if let Some(old) = self.registered_serial.take() {
            if old != serial {
                self.mqtt.unregister(&format!("{old}/command"));
            }
        }
        self.mqtt
            .register(format!("{serial}/command"), self.commands_tx.clone());
        self.config.remember_known_serial(&serial);
        self.registered_serial = Some(serial);
        Ok(())
    }

    /// Publishes `field = value` under this connection's discovered serial.
    /// A no-op (with a debug log) if the serial isn't known yet — this
    /// can't currently happen since every publishable reply kind is only
    /// queried after `QID` succeeds, but it's cheap to guard against a
    /// future query ordering change.
    async fn publish_keyed(&self, field: &str, value: String) -> Result<()> {
        match &self.registered_serial {
            Some(serial) => self.mqtt.publish(&format!("{serial}/{field}"), value).await,
            None => {
                debug!("{}: dropping {field}={value}, serial not yet known", self.peer);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, InverterConfig, MqttConfig};
    use tokio::net::TcpListener;

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

    async fn test_connection() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (accepted, peer) = listener.accept().await.unwrap();

        let (mqtt, _eventloop) = Mqtt::new(test_config());
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let conn = Connection::new(accepted, peer, mqtt, test_config(), shutdown_rx);
        (conn, client)
    }

    #[tokio::test]
    async fn set_charge_priority_command_enqueues_pcp01() {
        let (mut conn, _client) = test_connection().await;
        conn.handle_command(IncomingCommand {
            topic_suffix: "set_charge_priority".to_string(),
            payload: "solar_first".to_string(),
        });

        let tx = conn.engine.next_to_transmit(Instant::now()).unwrap();
        assert_eq!(tx.payload, b"PCP01");
        assert_eq!(tx.preamble, crate::frame::PREAMBLE_SETTING);
    }

    #[tokio::test]
    async fn set_output_priority_command_enqueues_pop02() {
        let (mut conn, _client) = test_connection().await;
        conn.handle_command(IncomingCommand {
            topic_suffix: "set_output_priority".to_string(),
            payload: "solar_battery_utility".to_string(),
        });

        let tx = conn.engine.next_to_transmit(Instant::now()).unwrap();
        assert_eq!(tx.payload, b"POP02");
    }

    #[tokio::test]
    async fn unknown_command_payload_is_dropped_without_enqueueing() {
        let (mut conn, _client) = test_connection().await;
        conn.handle_command(IncomingCommand {
            topic_suffix: "set_charge_priority".to_string(),
            payload: "not_a_real_priority".to_string(),
        });

        assert!(conn.engine.next_to_transmit(Instant::now()).is_none());
    }

    #[tokio::test]
    async fn connection_writes_the_first_qpi_frame_to_its_own_socket() {
        let (mut conn, mut client) = test_connection().await;
        conn.engine.tick(Instant::now());
        let tx = conn.engine.next_to_transmit(Instant::now()).unwrap();
        assert_eq!(tx.payload, b"QPI");

        let frame = frame::encode(tx.counter, tx.preamble, &tx.payload);
        conn.socket.write_all(&frame).await.unwrap();

        let mut buf = vec![0u8; frame.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, frame);
    }

    #[tokio::test]
    async fn serial_discovery_registers_and_replaces_mqtt_prefix() {
        let (mut conn, _client) = test_connection().await;
        conn.on_serial_discovered("96332309100452".to_string()).await.unwrap();
        assert_eq!(
            conn.mqtt.registered_prefixes(),
            vec!["96332309100452/command".to_string()]
        );

        conn.on_serial_discovered("96332309100499".to_string()).await.unwrap();
        assert_eq!(
            conn.mqtt.registered_prefixes(),
            vec!["96332309100499/command".to_string()]
        );
    }
}
