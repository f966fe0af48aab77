//! rackflash - patch and flash EPS rack firmware
//!
//! Patches stock firmware dumps with the built-in (or a custom) patch table,
//! checks image checksums, and programs patched images into the unit over CAN.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rackflash_core::Variant;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "rackflash")]
#[command(author, version, about = "EPS rack firmware patcher and flasher")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RACKFLASH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch a stock firmware image
    Patch {
        /// Firmware variant: 2501 or 3501
        #[arg(long)]
        variant: Variant,

        /// Stock image to read
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the patched image
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Patch table (TOML) replacing the built-in one
        #[arg(long)]
        table: Option<PathBuf>,
    },

    /// Check the checksum regions of an image
    Verify {
        /// Firmware variant: 2501 or 3501
        #[arg(long)]
        variant: Variant,

        /// Image to check
        #[arg(short, long)]
        input: PathBuf,

        /// Patch table (TOML) providing the checksum regions
        #[arg(long)]
        table: Option<PathBuf>,
    },

    /// Program an image into the unit
    Flash {
        /// Firmware variant: 2501 or 3501
        #[arg(long)]
        variant: Variant,

        /// Patched image to program
        #[arg(short, long)]
        input: PathBuf,

        /// CAN bus index
        #[arg(short, long)]
        bus: Option<u8>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Compute the security access key for a seed
    Keygen {
        /// 4-byte seed in hex, e.g. 5C000000
        seed: String,
    },

    /// List built-in firmware variants
    Variants,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let bus_arg = match &cli.command {
        Commands::Flash { bus, .. } => *bus,
        _ => None,
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        bus_arg,
        cli.output.as_ref().map(OutputFormat::as_str),
        cli.no_color,
    );
    let format = OutputFormat::from_str(&merged.output, true).unwrap_or_default();

    // Create output context
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        Commands::Patch {
            variant,
            input,
            output,
            table,
        } => commands::patch(*variant, input, output, table.as_deref(), &ctx),

        Commands::Verify {
            variant,
            input,
            table,
        } => commands::verify(*variant, input, table.as_deref(), &ctx),

        Commands::Flash {
            variant,
            input,
            yes,
            ..
        } => {
            commands::flash(
                *variant,
                input,
                merged.bus,
                *yes,
                &config.flash,
                &config.transport,
                &ctx,
            )
            .await
        }

        Commands::Keygen { seed } => commands::keygen(seed, &ctx),

        Commands::Variants => commands::variants(&ctx),
    }
}
