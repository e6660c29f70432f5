//! noir CLI - batch black-and-white portrait enhancement.
//!
//! noir takes portraits as input, locates and crops the subject's face, and
//! asks a generative image model for a studio black-and-white rendition in
//! the chosen photographer's style. Results are written next to each other
//! in an output directory; an optional JSON report describes every job.
//!
//! # Usage
//!
//! ```bash
//! # Enhance a folder of portraits with stored preferences
//! noir enhance ./shoot/
//!
//! # Override the style for one run and keep it for next time
//! noir enhance a.jpg b.jpg --style richard-avedon --background "#101010" --save-prefs
//!
//! # Touch up a finished image using another as reference
//! noir refine out/a-noir.png -i "soften the shadow under the chin" -r b.jpg
//!
//! # Inspect preferences and configuration
//! noir prefs show
//! noir config path
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// noir - studio black-and-white portraits from ordinary photos.
#[derive(Parser, Debug)]
#[command(name = "noir")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "NOIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Enhance one or more portraits
    Enhance(cli::enhance::EnhanceArgs),

    /// Revise an enhanced image with a free-text instruction
    Refine(cli::refine::RefineArgs),

    /// View and change stored style preferences
    Prefs(cli::prefs::PrefsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match cli::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e:#}\n  \
                 Using default configuration. Check your config file with `noir config path`."
            );
            noir_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("noir v{}", noir_core::VERSION);

    match cli.command {
        Commands::Enhance(args) => cli::enhance::execute(args, config_path).await,
        Commands::Refine(args) => cli::refine::execute(args, config_path).await,
        Commands::Prefs(args) => cli::prefs::execute(args).await,
        Commands::Config(args) => cli::config::execute(args, config_path).await,
    }
}
