//! fragments CLI
//!
//! Command-line interface for packing fragments into machines.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// fragments - pack work fragments onto sized machines
#[derive(Parser, Debug)]
#[command(name = "fragments")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level when not verbose
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack fragments into machines
    Pack {
        /// Cluster configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fragment records (JSON array or TOML `[[fragment]]` tables)
        #[arg(long)]
        fragments: PathBuf,

        /// Packer to use instead of the configured one
        #[arg(long)]
        packer: Option<String>,

        /// Write the resulting plan to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Verify that every required fragment is declared
    Verify {
        /// Fragment records
        #[arg(long)]
        fragments: PathBuf,
    },

    /// Print the fragment dependency graph
    Graph {
        /// Fragment records
        #[arg(long)]
        fragments: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = commands::GraphFormat::Dot)]
        format: commands::GraphFormat,
    },

    /// Show machine information from a saved plan
    Info {
        /// Cluster configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Plan written by `pack --output`
        #[arg(long)]
        plan: PathBuf,
    },

    /// List the available packers
    Packers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        match cli.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let registry = fragments_packer::PackerRegistry::with_defaults();

    match cli.command {
        Commands::Pack {
            config,
            fragments,
            packer,
            output,
        } => {
            commands::pack(&registry, config, fragments, packer, output).await?;
        }
        Commands::Verify { fragments } => {
            commands::verify(fragments).await?;
        }
        Commands::Graph { fragments, format } => {
            commands::graph(fragments, format).await?;
        }
        Commands::Info { config, plan } => {
            commands::info(&registry, config, plan).await?;
        }
        Commands::Packers => {
            commands::packers(&registry);
        }
    }

    Ok(())
}
