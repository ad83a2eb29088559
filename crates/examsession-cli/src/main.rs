//! examsession CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "examsession", version, about = "Timed multi-subject exam runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take an exam interactively
    Run {
        /// Path to the .toml exam plan
        #[arg(long)]
        plan: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Acting user id (overrides config)
        #[arg(long)]
        user: Option<String>,

        /// Exam length in seconds (overrides plan and config)
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Output directory for the outcome (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write an HTML results page
        #[arg(long)]
        html: bool,

        /// Use the plan's embedded questions and a local grader instead of the service
        #[arg(long)]
        offline: bool,
    },

    /// Fetch and print the questions of one subject
    Questions {
        /// Subject id
        #[arg(long)]
        subject: String,

        /// Print raw JSON instead of text
        #[arg(long)]
        json: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an exam plan file
    Validate {
        /// Path to the .toml exam plan
        #[arg(long)]
        plan: PathBuf,
    },

    /// Create starter config and example exam plan
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("examsession=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            plan,
            config,
            user,
            duration_secs,
            output,
            html,
            offline,
        } => {
            commands::run::execute(commands::run::RunArgs {
                plan,
                config,
                user,
                duration_secs,
                output,
                html,
                offline,
            })
            .await
        }
        Commands::Questions {
            subject,
            json,
            config,
        } => commands::questions::execute(subject, json, config).await,
        Commands::Validate { plan } => commands::validate::execute(plan),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
