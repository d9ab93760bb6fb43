//! Acceptor (C6): listens for inbound inverter connections and spawns a
//! connection worker per accepted socket.

use crate::connection::Connection;
use crate::mqtt::Mqtt;
use crate::prelude::*;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Duration;

const ACCEPT_DEADLINE: Duration = Duration::from_secs(1);

pub struct Acceptor {
    config: ConfigWrapper,
    mqtt: Mqtt,
}

impl Acceptor {
    pub fn new(config: ConfigWrapper, mqtt: Mqtt) -> Self {
        Self { config, mqtt }
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let inverter = self.config.inverter();
        let addr = format!("{}:{}", inverter.listen_address(), inverter.port());
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow!("acceptor.rs:failed to bind {}: {}", addr, e))?;
        info!("listening for inverter connections on {}", addr);

        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        loop {
            if shutdown.try_recv().is_ok() {
                break;
            }

            match tokio::time::timeout(ACCEPT_DEADLINE, listener.accept()).await {
                Ok(Ok((socket, peer))) => {
                    let conn = Connection::new(
                        socket,
                        peer,
                        self.mqtt.clone(),
                        self.config.clone(),
                        shutdown.resubscribe(),
                    );
                    workers.push(tokio::spawn(conn.run()));
                }
                Ok(Err(e)) => warn!("accept error: {}", e),
                Err(_) => {} // accept deadline elapsed, loop to check shutdown
            }

            workers.retain(|h| !h.is_finished());
        }

        info!("acceptor shutting down, waiting for {} connection(s)", workers.len());
        for handle in workers {
            let _ = handle.await;
        }
        info!("acceptor shutdown complete");
        Ok(())
    }
}
