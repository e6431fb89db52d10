//! Prism CLI - compare image generation models from the terminal

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{compare, history, init, models, sessions, Format};
use prism_gen::{telemetry, PrismConfig};

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Fan one prompt out to several image models and compare the results", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter .prism/config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Send a prompt to several models at once
    Compare {
        /// Prompt text
        prompt: String,

        /// Comma-separated model ids (defaults to the whole catalog)
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,

        /// Return right after dispatch instead of waiting for results
        #[arg(long)]
        no_wait: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = parse_format)]
        format: Format,
    },

    /// Refine a prompt against one model
    Iterate {
        /// Refined prompt text
        prompt: String,

        /// Model id (defaults to the model picked with `prism select`)
        #[arg(long)]
        model: Option<String>,

        /// Return right after dispatch instead of waiting for results
        #[arg(long)]
        no_wait: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = parse_format)]
        format: Format,
    },

    /// Reconcile a session until every task finishes
    Poll {
        /// Session ID
        session_id: String,

        /// Reconcile once and print the snapshot
        #[arg(long)]
        once: bool,

        /// Output format (text or json)
        #[arg(long, default_value = "text", value_parser = parse_format)]
        format: Format,
    },

    /// Pick a finished result to iterate on
    Select {
        /// Task ID of a successful result
        task_id: String,
    },

    /// List your sessions
    Sessions,

    /// Iteration history operations
    #[command(subcommand)]
    History(history::HistoryCommands),

    /// List catalog models and whether their provider is configured
    Models,
}

fn parse_format(s: &str) -> Result<Format, String> {
    match s {
        "text" => Ok(Format::Text),
        "json" => Ok(Format::Json),
        _ => Err(format!("unknown format '{}'; valid values: text, json", s)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match PrismConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config: {}", e);
            PrismConfig::default()
        }
    };
    telemetry::init(&config.compare.log_level);

    match cli.command {
        Commands::Init { force } => init::run(force),
        Commands::Compare {
            prompt,
            models,
            no_wait,
            format,
        } => compare::run_compare(&config, prompt, models, !no_wait, format),
        Commands::Iterate {
            prompt,
            model,
            no_wait,
            format,
        } => compare::run_iterate(&config, prompt, model, !no_wait, format),
        Commands::Poll {
            session_id,
            once,
            format,
        } => compare::run_poll(&config, &session_id, once, format),
        Commands::Select { task_id } => history::run_select(&config, &task_id),
        Commands::Sessions => sessions::run(&config),
        Commands::History(cmd) => history::run(cmd),
        Commands::Models => models::run(&config),
    }
}
