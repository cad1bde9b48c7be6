//! # fastsim CLI
//!
//! Command-line driver for the fastsim simulation kernel.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fastsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a world file and run the simulation
    Run {
        /// Path to the world file
        world: PathBuf,

        /// Additional plugin search directories
        #[arg(long = "plugin-path")]
        plugin_paths: Vec<PathBuf>,

        /// Global steps per second (0 = as fast as possible)
        #[arg(long, default_value_t = 100.0)]
        rate: f64,

        /// Number of global steps to run
        #[arg(long, default_value_t = 100)]
        steps: u64,

        /// Print the final snapshot as JSON
        #[arg(long)]
        dump: bool,
    },

    /// Build a world file without running it and report problems
    Check {
        /// Path to the world file
        world: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the built-in plugins
    Plugins,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            world,
            plugin_paths,
            rate,
            steps,
            dump,
        } => {
            let opts = commands::RunOptions {
                plugin_paths,
                rate,
                steps,
                dump,
            };
            commands::run_world(&world, opts)
        }
        Commands::Check { world, json } => commands::check_world(&world, json),
        Commands::Plugins => commands::list_plugins(),
    }
}
