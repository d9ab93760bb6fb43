//! MQTT facade (C5): single shared client, topic-prefix dispatch to
//! per-connection command handlers, and a thin publish API.

use crate::prelude::*;
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, Publish, QoS};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;

/// A command arriving on a registered connection's topic prefix, trimmed to
/// the suffix after that prefix.
#[derive(Debug, Clone)]
pub struct IncomingCommand {
    pub topic_suffix: String,
    pub payload: String,
}

type Registration = (String, UnboundedSender<IncomingCommand>);

/// Shared MQTT client handle. Cheap to clone; every connection worker holds
/// one to register its command handler and publish its own topics.
#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    client: AsyncClient,
    registrations: Arc<Mutex<Vec<Registration>>>,
}

impl Mqtt {
    /// Builds the client and its paired event loop. The event loop must be
    /// driven by `run` for publishes/subscriptions/dispatch to happen.
    pub fn new(config: ConfigWrapper) -> (Self, rumqttc::EventLoop) {
        let mqtt_config = config.mqtt();
        let mut options = MqttOptions::new(
            "voltronic-bridge",
            mqtt_config.host(),
            mqtt_config.port(),
        );
        options.set_keep_alive(Duration::from_secs(60));

        let will = LastWill {
            topic: format!("{}/connected", mqtt_config.topic()),
            message: "0".into(),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        if let (Some(user), Some(pass)) = (mqtt_config.username(), mqtt_config.password()) {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);

        (
            Self {
                config,
                client,
                registrations: Arc::new(Mutex::new(Vec::new())),
            },
            eventloop,
        )
    }

    /// Registers a handler for every topic beginning with `<base>/<prefix>`.
    pub fn register(&self, prefix: impl Into<String>, handler: UnboundedSender<IncomingCommand>) {
        self.registrations.lock().unwrap().push((prefix.into(), handler));
    }

    /// Removes the first registration matching `prefix`, if any.
    pub fn unregister(&self, prefix: &str) {
        let mut regs = self.registrations.lock().unwrap();
        if let Some(pos) = regs.iter().position(|(p, _)| p == prefix) {
            regs.remove(pos);
        }
    }

    /// Snapshot of the currently registered topic prefixes, in registration
    /// order. Used for diagnostics and by tests that need to observe
    /// serial (un)registration without a live broker round-trip.
    pub fn registered_prefixes(&self) -> Vec<String> {
        self.registrations
            .lock()
            .unwrap()
            .iter()
            .map(|(prefix, _)| prefix.clone())
            .collect()
    }

    /// Publishes `value` to `<base>/<topic_part>`.
    pub async fn publish(&self, topic_part: &str, value: impl Into<String>) -> Result<()> {
        let topic = format!("{}/{}", self.config.mqtt().topic(), topic_part);
        let payload = value.into();
        debug!("publishing {} = {}", topic, payload);
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into_bytes())
            .await?;
        Ok(())
    }

    /// Drives the event loop: connect handling, dispatch of incoming
    /// publishes to registered handlers, and reconnect backoff. Runs until
    /// cancelled by the caller.
    pub async fn run(&self, mut eventloop: rumqttc::EventLoop) -> Result<()> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    if let Err(e) = self.on_connect().await {
                        error!("mqtt on_connect failed: {}", e);
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(publish))) => self.dispatch(publish),
                Ok(_) => {}
                Err(e) => {
                    error!("mqtt event loop error: {}, retrying in 5s", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn on_connect(&self) -> Result<()> {
        let base = self.config.mqtt().topic();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        self.client
            .publish(
                format!("{base}/connected"),
                QoS::AtLeastOnce,
                true,
                now.as_secs().to_string(),
            )
            .await?;
        self.client
            .subscribe(format!("{base}/#"), QoS::AtMostOnce)
            .await?;
        info!("mqtt connected, subscribed to {base}/#");
        Ok(())
    }

    /// Invoked synchronously as each publish arrives off the broker
    /// connection; handlers must not block on I/O, so this only ever does
    /// an unbounded channel send.
    fn dispatch(&self, publish: Publish) {
        let base = self.config.mqtt().topic();
        let payload = match std::str::from_utf8(&publish.payload) {
            Ok(p) => p.to_string(),
            Err(_) => {
                warn!("ignoring non-UTF8 payload on {}", publish.topic);
                return;
            }
        };

        let regs = self.registrations.lock().unwrap();
        for (prefix, handler) in regs.iter() {
            let full_prefix = format!("{base}/{prefix}");
            if let Some(rest) = publish.topic.strip_prefix(&full_prefix) {
                let suffix = rest.trim_start_matches('/').to_string();
                let _ = handler.send(IncomingCommand {
                    topic_suffix: suffix,
                    payload: payload.clone(),
                });
            }
        }
    }
}
