//! Kiln CLI - run and inspect cached pipelines.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_executor::observability::{LogFormat, TracingConfig, init_tracing};

/// Kiln - content-addressed cached pipeline engine.
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline definition
    Run {
        /// Path to the pipeline YAML file
        file: String,

        /// Module id to update (repeatable). Defaults to the file's sinks
        #[arg(short, long = "sink")]
        sinks: Vec<u32>,

        /// Execute the same pipeline this many times against one cache
        #[arg(short, long, default_value = "1")]
        repeat: u32,

        /// Audit label attached to newly cached modules
        #[arg(long)]
        reason: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a pipeline definition against the standard modules
    Validate {
        /// Path to the pipeline YAML file
        file: String,
    },

    /// Print the subpipeline signature of every module
    Signature {
        /// Path to the pipeline YAML file
        file: String,
    },

    /// List the standard modules
    Modules {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn setup_logging(verbosity: u8) -> Result<()> {
    // Explicit format override, otherwise pick by terminal
    let log_format = std::env::var("KILN_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse::<LogFormat>().ok())
        .unwrap_or_else(|| {
            if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
                LogFormat::Pretty
            } else {
                LogFormat::Compact
            }
        });

    let mut builder = TracingConfig::builder()
        .log_format(log_format)
        .verbosity(verbosity);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        builder = builder.log_filter(filter);
    }

    init_tracing(builder.build())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Run {
            file,
            sinks,
            repeat,
            reason,
            json,
        } => commands::run::run(&commands::run::RunArgs {
            file: &file,
            sinks: &sinks,
            repeat,
            reason: reason.as_deref(),
            json,
        }),
        Commands::Validate { file } => commands::validate::run(&file),
        Commands::Signature { file } => commands::signature::run(&file),
        Commands::Modules { json } => commands::modules::run(json),
        Commands::Version => commands::version::run(),
    }
}
