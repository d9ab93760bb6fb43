use crate::prelude::*;

use serde::Deserialize;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub inverter: InverterConfig,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// MqttConfig {{{
#[derive(Clone, Debug, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_topic")]
    pub topic: String,
}

impl MqttConfig {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
} // }}}

// InverterConfig {{{
/// The listener side of the bridge: where it accepts inbound dongle
/// connections, plus the serials it has previously learned so operators can
/// see which devices have dialed in before without waiting for one to
/// reconnect. This is a convenience, not protocol state: losing it on
/// restart costs nothing but a log line.
#[derive(Clone, Debug, Deserialize)]
pub struct InverterConfig {
    #[serde(default = "Config::default_listen_address")]
    pub listen_address: String,
    #[serde(default = "Config::default_inverter_port")]
    pub port: u16,

    #[serde(default = "Vec::new")]
    pub known_serials: Vec<Serial>,
}

impl InverterConfig {
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn known_serials(&self) -> &[Serial] {
        &self.known_serials
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
    path: Option<String>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            path: self.path.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(&file)?;
        Ok(Self {
            config: Arc::new(Mutex::new(config)),
            path: Some(file),
        })
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            path: None,
        }
    }

    pub fn mqtt(&self) -> MqttConfig {
        self.config.lock().unwrap().mqtt.clone()
    }

    pub fn inverter(&self) -> InverterConfig {
        self.config.lock().unwrap().inverter.clone()
    }

    pub fn loglevel(&self) -> String {
        self.config.lock().unwrap().loglevel.clone()
    }

    pub fn apply_overrides(&self, options: &crate::options::Options) {
        self.config.lock().unwrap().apply_overrides(options);
    }

    /// Checks the configuration is usable, after any CLI overrides have
    /// been applied. Called explicitly rather than from `new`/`Config::new`
    /// so that a CLI-only invocation (no config file, `mqtt_host`/
    /// `mqtt_port` supplied positionally) is validated only once the
    /// overrides have had a chance to fill in what the file didn't.
    pub fn validate(&self) -> Result<()> {
        self.config.lock().unwrap().validate()
    }

    /// Best-effort persistence of a newly learned serial: appends it to the
    /// in-memory config and, if the config was loaded from a file, rewrites
    /// that file. Never blocks or retries on failure — a write error is
    /// logged and otherwise ignored, since this must never hold up the
    /// connection's protocol loop.
    pub fn remember_known_serial(&self, serial: &Serial) {
        let snapshot = {
            let mut config = self.config.lock().unwrap();
            if config.inverter.known_serials.iter().any(|s| s == serial) {
                return;
            }
            config.inverter.known_serials.push(serial.clone());
            config.clone()
        };

        if let Some(path) = &self.path {
            if let Err(e) = snapshot.write_to(path) {
                warn!("config.rs:failed to persist learned serial {}: {}", serial, e);
            }
        }
    }
}

impl Config {
    /// Loads `file` if it exists. A missing file is not an error: the
    /// original tool has no config-file mechanism at all, and this bridge's
    /// CLI-only mode (positional `mqtt_host`/`mqtt_port`, no `--config`
    /// file on disk) is expected to fall back to built-in defaults here and
    /// rely on `apply_overrides` to fill in the rest. A file that exists
    /// but fails to parse is still a fatal configuration error.
    pub fn new(file: &str) -> Result<Self> {
        let content = match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no config file at {}, using built-in defaults", file);
                return Ok(Self::default());
            }
            Err(err) => return Err(anyhow!("config.rs:error reading {}: {}", file, err)),
        };

        info!("reading configuration from {}", file);
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|err| anyhow!("config.rs:error parsing {}: {}", file, err))?;

        info!(
            "configuration loaded: mqtt {}:{} topic {:?}, listening on {}:{}, {} known serial(s)",
            config.mqtt.host,
            config.mqtt.port,
            config.mqtt.topic,
            config.inverter.listen_address,
            config.inverter.port,
            config.inverter.known_serials.len(),
        );

        Ok(config)
    }

    fn write_to(&self, file: &str) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(file, content)
            .map_err(|err| anyhow!("config.rs:error writing {}: {}", file, err))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.mqtt.host.is_empty() {
            bail!("config.rs:mqtt.host cannot be empty");
        }
        if self.mqtt.port == 0 {
            bail!("config.rs:mqtt.port must be between 1 and 65535");
        }
        if self.mqtt.topic.is_empty() {
            bail!("config.rs:mqtt.topic cannot be empty");
        }
        if self.inverter.port == 0 {
            bail!("config.rs:inverter.port must be between 1 and 65535");
        }
        Ok(())
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_topic() -> String {
        "voltronic".to_string()
    }

    fn default_listen_address() -> String {
        "0.0.0.0".to_string()
    }

    fn default_inverter_port() -> u16 {
        502
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

impl Default for Config {
    /// Built-in defaults for a CLI-only invocation with no config file.
    /// `mqtt.host` is left empty; it's expected to be filled in by
    /// `apply_overrides` from the required positional CLI argument before
    /// `validate` ever runs.
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                host: String::new(),
                port: Self::default_mqtt_port(),
                username: None,
                password: None,
                topic: Self::default_mqtt_topic(),
            },
            inverter: InverterConfig {
                listen_address: Self::default_listen_address(),
                port: Self::default_inverter_port(),
                known_serials: Vec::new(),
            },
            loglevel: Self::default_loglevel(),
        }
    }
}

impl Config {

    /// Applies CLI overrides on top of whatever the config file set. CLI
    /// flags win when present; an absent flag leaves the file's value
    /// untouched.
    pub fn apply_overrides(&mut self, options: &crate::options::Options) {
        if let Some(host) = &options.mqtt_host {
            self.mqtt.host = host.clone();
        }
        if let Some(port) = options.mqtt_port {
            self.mqtt.port = port;
        }
        if let Some(user) = &options.mqtt_username {
            self.mqtt.username = Some(user.clone());
        }
        if let Some(pass) = &options.mqtt_password {
            self.mqtt.password = Some(pass.clone());
        }
        if let Some(topic) = &options.mqtt_topic {
            self.mqtt.topic = topic.clone();
        }
        if let Some(port) = options.listen_port {
            self.inverter.port = port;
        }
        if let Some(loglevel) = &options.loglevel {
            self.loglevel = loglevel.clone();
        }
    }
}

impl serde::Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Config", 3)?;
        s.serialize_field("mqtt", &self.mqtt)?;
        s.serialize_field("inverter", &self.inverter)?;
        s.serialize_field("loglevel", &self.loglevel)?;
        s.end()
    }
}

impl serde::Serialize for MqttConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("MqttConfig", 5)?;
        s.serialize_field("host", &self.host)?;
        s.serialize_field("port", &self.port)?;
        s.serialize_field("username", &self.username)?;
        s.serialize_field("password", &self.password)?;
        s.serialize_field("topic", &self.topic)?;
        s.end()
    }
}

impl serde::Serialize for InverterConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("InverterConfig", 3)?;
        s.serialize_field("listen_address", &self.listen_address)?;
        s.serialize_field("port", &self.port)?;
        s.serialize_field("known_serials", &self.known_serials)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let f = write_temp(
            r#"
mqtt:
  host: broker.local
inverter:
  port: 502
"#,
        );
        let config = Config::new(f.path().to_str().unwrap()).unwrap();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "voltronic");
        assert_eq!(config.inverter.listen_address, "0.0.0.0");
        assert_eq!(config.loglevel, "info");
    }

    #[test]
    fn rejects_empty_mqtt_host() {
        let f = write_temp(
            r#"
mqtt:
  host: ""
inverter:
  port: 502
"#,
        );
        let config = Config::new(f.path().to_str().unwrap()).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = Config::new("/nonexistent/path/definitely-not-here.yaml").unwrap();
        assert_eq!(config.mqtt.host, "");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.inverter.port, 502);
        assert_eq!(config.mqtt.topic, "voltronic");
        assert!(config.validate().is_err());
    }

    #[test]
    fn remember_known_serial_persists_and_dedupes() {
        let f = write_temp(
            r#"
mqtt:
  host: broker.local
inverter:
  port: 502
"#,
        );
        let path = f.path().to_str().unwrap().to_string();
        let wrapper = ConfigWrapper::new(path.clone()).unwrap();

        let serial: Serial = "96332309100452".into();
        wrapper.remember_known_serial(&serial);
        wrapper.remember_known_serial(&serial);
        assert_eq!(wrapper.inverter().known_serials(), &[serial.clone()]);

        let reloaded = Config::new(&path).unwrap();
        assert_eq!(reloaded.inverter.known_serials, vec![serial]);
    }

    #[test]
    fn cli_overrides_win_over_file_values() {
        let f = write_temp(
            r#"
mqtt:
  host: broker.local
  port: 1883
inverter:
  port: 502
"#,
        );
        let mut config = Config::new(f.path().to_str().unwrap()).unwrap();

        let options = crate::options::Options {
            config_file: "unused.yaml".to_string(),
            loglevel: Some("debug".to_string()),
            mqtt_host: Some("override.local".to_string()),
            mqtt_port: Some(8883),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_topic: None,
            listen_port: Some(5020),
        };
        config.apply_overrides(&options);

        assert_eq!(config.mqtt.host, "override.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.inverter.port, 5020);
        assert_eq!(config.loglevel, "debug");
    }
}
