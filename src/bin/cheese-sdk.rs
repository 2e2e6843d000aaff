// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use cheese_sdk::{path::default_config_path, Pipeline, PipelineConfig, SystemToolchain};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Assemble the Cheese SDK from its prebuilt template and source repositories.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "cheese-sdk [options] <android_sdk>",
    version
)]
struct Cli {
    /// Path to local Android SDK.
    #[arg(value_name = "android_sdk")]
    pub android_sdk: PathBuf,

    /// Pipeline configuration file to use instead of the default one.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Clone repositories without going through the configured proxy.
    #[arg(long)]
    pub no_proxy: bool,

    /// Print effective pipeline configuration and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let mut config = load_config(self.config)?;
        if self.no_proxy {
            config.network.proxy = None;
        }

        if self.print_config {
            print!("{config}");
            return Ok(());
        }

        let android_sdk = cheese_sdk::path::expand(&self.android_sdk);
        let toolchain = SystemToolchain::new(&config)?;
        let report = Pipeline::new(config, android_sdk, toolchain).run().await?;

        for chain in &report.chains {
            match (&chain.failure, chain.reached) {
                (None, _) => info!("{}: done", chain.name),
                (Some(_), Some(stage)) => warn!("{}: stopped after {stage}", chain.name),
                (Some(_), None) => warn!("{}: stopped before clone", chain.name),
            }
        }

        Ok(())
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        info!("load configuration from {:?}", path.display());
        return Ok(PipelineConfig::load(path)?);
    }

    let path = default_config_path()?;
    if path.is_file() {
        info!("load configuration from {:?}", path.display());
        return Ok(PipelineConfig::load(path)?);
    }

    Ok(PipelineConfig::default())
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}
