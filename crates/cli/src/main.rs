//! linefit CLI, the main entry point.
//!
//! Commands:
//! - `resolve`  : Resolve line-fitting sections into parameter tables
//! - `check`    : Validate every line-fitting section of a document
//! - `sections` : List the line-fitting sections of a document
//! - `lines`    : List the lines a section fits
//! - `config`   : Show resolver settings or their path

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "linefit",
    about = "linefit: resolve line-fitting recipes into optimizer parameter tables",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Resolver settings file (defaults to ~/.linefit/config.toml)
    #[arg(short, long, global = true, env = "LINEFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve line-fitting sections into fit models
    Resolve {
        /// Observation configuration file
        file: PathBuf,

        /// Only resolve these sections
        #[arg(short, long)]
        section: Vec<String>,

        /// Resolve `<object>_line_fitting` for each object (comma separated)
        #[arg(long, value_delimiter = ',')]
        objects: Vec<String>,

        /// Read the object list from `<section>.<key>`, e.g. sample_data.object_list
        #[arg(long, conflicts_with = "objects")]
        objects_from: Option<String>,

        /// Output format (json or toml); overrides the settings file
        #[arg(short, long)]
        format: Option<String>,

        /// Write the output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the canonical recipe text instead of the model
        #[arg(long)]
        recipe: bool,
    },

    /// Validate every line-fitting section and report all errors
    Check {
        /// Observation configuration file
        file: PathBuf,
    },

    /// List line-fitting sections
    Sections {
        /// Observation configuration file
        file: PathBuf,
    },

    /// List the lines fitted by a section
    Lines {
        /// Observation configuration file
        file: PathBuf,

        /// Section to inspect
        section: String,
    },

    /// Resolver settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings as TOML
    Show,
    /// Print the settings file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let settings = cli.config.as_deref();
    match cli.command {
        Commands::Resolve {
            file,
            section,
            objects,
            objects_from,
            format,
            output,
            recipe,
        } => {
            let request = commands::resolve::Request {
                file,
                sections: section,
                objects,
                objects_from,
                format,
                output,
                recipe,
            };
            commands::resolve::run(settings, request).await?
        }
        Commands::Check { file } => commands::check::run(settings, &file).await?,
        Commands::Sections { file } => commands::sections::run(settings, &file).await?,
        Commands::Lines { file, section } => {
            commands::lines::run(settings, &file, &section).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(settings).await?,
            ConfigAction::Path => commands::config_cmd::path(settings).await?,
        },
    }

    Ok(())
}
