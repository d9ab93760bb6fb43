pub mod acceptor;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod connection;
pub mod crc;
pub mod error;
pub mod frame;
pub mod mqtt;
pub mod options;
pub mod prelude;
pub mod query;
pub mod serial;

use crate::acceptor::Acceptor;
use crate::mqtt::Mqtt;
use crate::options::Options;
use crate::prelude::*;
use std::error::Error;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(loglevel: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(loglevel))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();
}

/// Loads configuration, applies CLI overrides, and wires up the MQTT facade
/// and the inbound acceptor. Runs until `shutdown_rx` fires, then tears
/// both down in order: acceptor first (which drains its connection
/// workers), then the MQTT client.
pub async fn app(
    options: Options,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    // Log at a sane default until the config file tells us what it wants;
    // mirrors the two-phase init below.
    init_logging("info");

    info!("voltronic-bridge {} starting, config file: {}", CARGO_PKG_VERSION, options.config_file);

    let config = ConfigWrapper::new(options.config_file.clone()).unwrap_or_else(|err| {
        error!("failed to load config: {:?}", err);
        std::process::exit(255);
    });
    config.apply_overrides(&options);
    if let Err(err) = config.validate() {
        error!("invalid configuration: {:?}", err);
        std::process::exit(255);
    }

    {
        let mqtt_cfg = config.mqtt();
        let inverter_cfg = config.inverter();
        info!(
            "config loaded: mqtt {}:{}, listening on {}:{}",
            mqtt_cfg.host(),
            mqtt_cfg.port(),
            inverter_cfg.listen_address(),
            inverter_cfg.port()
        );
    }
    init_logging(&config.loglevel());

    let channels = Channels::new();

    let (mqtt, eventloop) = Mqtt::new(config.clone());
    let mqtt_for_run = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt_for_run.run(eventloop).await {
            error!("mqtt task failed: {}", e);
        }
    });

    let acceptor = Acceptor::new(config.clone(), mqtt.clone());
    let acceptor_shutdown = channels.shutdown.subscribe();
    let acceptor_handle = tokio::spawn(async move {
        if let Err(e) = acceptor.run(acceptor_shutdown).await {
            error!("acceptor task failed: {}", e);
        }
    });

    let _ = shutdown_rx.recv().await;
    info!("shutdown signal received");
    let _ = channels.shutdown.send(());

    if let Err(e) = acceptor_handle.await {
        error!("error waiting for acceptor task: {}", e);
    }
    mqtt_handle.abort();

    info!("shutdown complete");
    Ok(())
}

/// Process entry point: parses CLI options, sets up the ctrl-c → shutdown
/// broadcast, and runs the application until it exits.
pub async fn run() -> Result<()> {
    let options = Options::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    app(options, shutdown_rx).await.map_err(|e| anyhow!("{}", e))
}
