mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use optimus_client::OptimusClient;
use optimus_common::config::ClientConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "optimus-cli")]
#[command(about = "Optimus CLI - Run code, submit solutions, and follow judging", long_about = None)]
struct Cli {
    /// JSON client config; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    /// Print client metrics on exit
    #[arg(long, global = true, default_value = "false")]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List languages the judge accepts
    Languages {
        /// Include disabled languages
        #[arg(long, default_value = "false")]
        all: bool,
    },

    /// Run code once in the sandbox without grading
    Run {
        /// Language code or alias (e.g., python, c++, js)
        #[arg(short, long)]
        lang: Option<String>,

        /// Source file, or "-" for stdin
        #[arg(short, long)]
        file: PathBuf,

        /// Text fed to the program's stdin
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Submit a solution for judging
    Submit {
        /// Problem ID
        #[arg(short, long)]
        problem: u64,

        /// Language code or alias
        #[arg(short, long)]
        lang: Option<String>,

        /// Source file, or "-" for stdin
        #[arg(short, long)]
        file: PathBuf,

        /// Return right after the submission is queued
        #[arg(long, default_value = "false")]
        no_wait: bool,
    },

    /// Show the current judging status of a submission
    Status {
        /// Submission ID
        id: u64,

        /// Keep polling until judging finishes
        #[arg(short, long, default_value = "false")]
        follow: bool,
    },

    /// Show a submission with its per-test results
    Show {
        /// Submission ID
        id: u64,

        /// Print the raw record as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List your submissions
    Mine {
        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Show your submission statistics
    Stats,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let loaded = match path {
        Some(path) => ClientConfig::load_from_file(path),
        None => ClientConfig::from_env(),
    };
    loaded
        .map_err(anyhow::Error::msg)
        .context("Invalid client configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(cli.config.as_ref())?;
    let client = OptimusClient::new(config).context("Failed to create Optimus client")?;

    let outcome = match cli.command {
        Commands::Languages { all } => commands::list_languages(&client, all).await,
        Commands::Run { lang, file, input } => {
            commands::run_code(&client, lang.as_deref(), &file, input.as_deref()).await
        }
        Commands::Submit {
            problem,
            lang,
            file,
            no_wait,
        } => commands::submit(&client, problem, lang.as_deref(), &file, no_wait).await,
        Commands::Status { id, follow } => commands::status(&client, id, follow).await,
        Commands::Show { id, json } => commands::show(&client, id, json).await,
        Commands::Mine { page } => commands::mine(&client, page).await,
        Commands::Stats => commands::stats(&client).await,
    };

    if cli.metrics {
        eprintln!("{}", optimus_client::metrics::gather_text());
    }

    outcome
}
