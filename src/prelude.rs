// Common imports shared by almost every module in this crate.
pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, warn};
pub use std::io::Write;
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::config::{Config, ConfigWrapper};
pub use crate::serial::Serial;
