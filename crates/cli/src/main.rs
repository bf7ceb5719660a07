// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::Parser;
use simwire_bridge::{DualPipeBridge, PipeBridge, TickDriver};
use simwire_config::BridgeConfig;
use simwire_core::LoopbackCore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "SimWire UART-over-TCP bridge",
    long_about = None
)]
struct Cli {
    /// Path to a bridge configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command-channel listen port (the console listens one above)
    #[arg(short, long)]
    port: Option<u16>,

    /// Run the single-channel (console only) bridge variant
    #[arg(long)]
    single: bool,

    /// Mirror flushed output to stdout
    #[arg(long)]
    echo: bool,

    /// Number of ticks to run; 0 runs until the process is stopped
    #[arg(long, default_value = "0")]
    max_ticks: u64,

    /// Enable debug-level tracing
    #[arg(short, long)]
    trace: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(port) = cli.port {
        config.command_port = port;
        // The console follows the overridden port unless the file pinned it.
        if cli.config.is_none() {
            config.console_port = None;
        }
    }
    if cli.echo {
        config.echo_stdout = true;
    }
    config.validate().context("invalid bridge configuration")?;
    Ok(config)
}

fn run_loop<B: TickDriver>(bridge: &mut B, max_ticks: u64) -> anyhow::Result<()> {
    if max_ticks == 0 {
        loop {
            bridge.tick()?;
        }
    }
    for _ in 0..max_ticks {
        bridge.tick()?;
    }
    bridge.shutdown();
    info!("bridge stats: {}", bridge.stats().snapshot());
    Ok(())
}

fn run(cli: &Cli, config: &BridgeConfig) -> anyhow::Result<()> {
    let char_ticks = config.effective_char_ticks();
    info!(
        "character time: {} ticks, buffers: {} bytes",
        char_ticks, config.buffer_capacity
    );

    if cli.single {
        let mut bridge = PipeBridge::new(
            LoopbackCore::new(),
            config.command_port,
            char_ticks,
            config.buffer_capacity,
        )?;
        bridge.set_echo_stdout(config.echo_stdout);
        run_loop(&mut bridge, cli.max_ticks)
    } else {
        let mut bridge = DualPipeBridge::new(
            LoopbackCore::new(),
            config.command_port,
            config.console_port(),
            char_ticks,
            config.buffer_capacity,
        )?;
        bridge.set_echo_stdout(config.echo_stdout);
        run_loop(&mut bridge, cli.max_ticks)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(&cli, &config) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
