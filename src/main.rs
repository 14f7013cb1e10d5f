use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mediarec::{cli, config, server};

#[derive(Parser)]
#[command(name = "mediarec", version, about = "Mood-aware game, book and movie recommendations")]
struct Cli {
    /// Config file (defaults to ~/.mediarec/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recommend five titles for a mood and a phrase
    Recommend {
        #[arg(long)]
        mood: Option<String>,
        #[arg(long)]
        phrase: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Mood classifier
    Mood {
        #[command(subcommand)]
        action: MoodAction,
    },
    /// Scrape the book listing into the books dataset
    Scrape {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Manage the reference index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Check data files, models and sqlite-vec
    Doctor,
    /// Start the MCP server (stdio unless --http or server.transport = "http")
    Serve {
        #[arg(long)]
        http: bool,
    },
}

#[derive(Subcommand)]
enum MoodAction {
    /// Print the mood label for a text
    Classify { text: String },
    /// Train the mood model from a labeled CSV
    Train {
        file: PathBuf,
        #[arg(long, default_value = "text")]
        text_column: String,
        #[arg(long, default_value = "label")]
        label_column: String,
        /// Hold out every Nth row for evaluation (0 disables)
        #[arg(long, default_value_t = 5)]
        holdout: usize,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Embed every catalog title and rewrite the reference files
    Build,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to the cache directory
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::AppConfig::load_from(path)?,
        None => config::AppConfig::load()?,
    };

    // stderr keeps stdout clean for CLI output and MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Recommend { mood, phrase, json } => {
            cli::recommend::recommend(&config, mood, phrase, json).await?;
        }
        Command::Mood { action } => match action {
            MoodAction::Classify { text } => cli::mood::classify(&config, &text)?,
            MoodAction::Train {
                file,
                text_column,
                label_column,
                holdout,
            } => cli::mood::train(&config, &file, &text_column, &label_column, holdout)?,
        },
        Command::Scrape { url, output } => {
            cli::scrape::scrape(&config, url, output).await?;
        }
        Command::Index { action } => match action {
            IndexAction::Build => cli::index::build(&config).await?,
        },
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
    }

    Ok(())
}
