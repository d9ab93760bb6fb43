use crate::prelude::*;

/// Process-wide broadcast channels; currently just the shutdown signal
/// shared by the MQTT facade and every connection worker.
#[derive(Clone)]
pub struct Channels {
    pub shutdown: broadcast::Sender<()>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            shutdown: broadcast::channel(1).0,
        }
    }
}
