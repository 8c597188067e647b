mod config;
mod error;
mod gc;
mod http;
mod json_ld;
mod service;
mod store;
mod supervisor;

use std::path::PathBuf;

use anyhow::Result;
use ractor::Actor;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

use crate::config::{Config, RuntimeConfig};
use crate::supervisor::Supervisor;

xflags::xflags! {
    /// Keep JSON documents: store, serve, transform and expire them.
    cmd docket {
        /// Path to a TOML configuration file.
        optional -c, --config config: PathBuf
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let flags = Docket::from_env_or_exit();
    let init = Config::load(flags.config.as_deref())?;
    let keyspace = fjall::Config::new(&init.data_dir).open()?;
    let config = RuntimeConfig::new(init, keyspace)?;

    let (supervisor, actor_handle) =
        Actor::spawn(Some("supervisor".into()), Supervisor, config.clone()).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        result = http::serve(&config) => {
            result?;
        }
        _ = sigterm.recv() => {
            info!("Received the terminate signal; stopping");
        }
        _ = sigint.recv() => {
            info!("Received the interrupt signal; stopping");
        }
    }

    supervisor.stop(None);
    actor_handle.await?;

    Ok(())
}
