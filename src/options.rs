use clap::Parser;

/// voltronic-bridge - a protocol bridge between Voltronic/Axpert-style
/// hybrid inverters and an MQTT broker.
///
/// `mqtt_host`/`mqtt_port` are positional, matching the original tool's
/// command line; when a config file is also given, these positional values
/// (and the optional flags below) override whatever it sets.
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// MQTT broker hostname (overrides the config file's mqtt.host if given)
    pub mqtt_host: Option<String>,

    /// MQTT broker port (overrides the config file's mqtt.port if given)
    pub mqtt_port: Option<u16>,

    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Log level override (error, warn, info, debug, trace)
    #[clap(short = 'l', long = "loglevel")]
    pub loglevel: Option<String>,

    /// MQTT username
    #[clap(short = 'u', long = "user")]
    pub mqtt_username: Option<String>,

    /// MQTT password
    #[clap(short = 'p', long = "password")]
    pub mqtt_password: Option<String>,

    /// MQTT base topic
    #[clap(short = 't', long = "topic")]
    pub mqtt_topic: Option<String>,

    /// TCP port to listen on for inverter connections
    #[clap(short = 'P', long = "port")]
    pub listen_port: Option<u16>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
