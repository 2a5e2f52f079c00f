// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `hap-mqtt` daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hap_mqtt::bridge::Bridge;
use hap_mqtt::bus::{Bus, MqttBus};
use hap_mqtt::config::Config;

#[derive(Parser)]
#[command(name = "hap-mqtt")]
#[command(about = "Bridge between MQTT home-automation devices and HomeKit")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Print the parsed configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    // RUST_LOG takes precedence over --debug.
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // The journal timestamps every line itself.
    let under_systemd = std::env::var_os("INVOCATION_ID").is_some()
        && std::env::var_os("JOURNAL_STREAM").is_some();
    if under_systemd {
        tracing_subscriber::fmt()
            .without_time()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

async fn connect(config: &Config) -> Result<MqttBus> {
    let mut builder = MqttBus::builder()
        .broker_url(&config.mqtt.broker)?
        .client_id(&config.mqtt.client_id);
    if let Some((username, password)) = config.mqtt.credentials() {
        builder = builder.credentials(username, password);
    }

    builder
        .build()
        .await
        .with_context(|| format!("cannot connect to MQTT broker {}", config.mqtt.broker))
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = Config::load(&cli.config)
        .with_context(|| format!("cannot load configuration {}", cli.config.display()))?;

    if cli.print_config {
        println!("# {}", cli.config.display());
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    config
        .validate()
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;

    info!(
        db_dir = %config.hap.db_dir,
        address = %config.hap.address,
        ifaces = ?config.hap.ifaces,
        "Accessory server settings"
    );

    let mqtt = Arc::new(connect(&config).await?);
    let bus: Arc<dyn Bus> = mqtt.clone();

    let bridge = Bridge::new(&config.devices);
    bridge.bind(&bus);
    for accessory in bridge.accessories() {
        info!(
            id = accessory.id(),
            name = %accessory.name(),
            model = %accessory.info().model,
            category = ?accessory.category(),
            "Accessory ready"
        );
    }

    shutdown_signal().await?;

    mqtt.disconnect().await?;
    info!("Stopped");
    Ok(())
}
