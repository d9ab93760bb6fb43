use anyhow::Result;
use log::error;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = voltronic_bridge::run().await {
        error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}


