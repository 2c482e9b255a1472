use std::path::PathBuf;

use clap::{Parser, Subcommand};
use magazine_qa::commands::{ask_question, index_document, run_chat, show_status};
use magazine_qa::config::{Config, get_config_dir, run_interactive_config, show_config};
use magazine_qa::{QaError, Result};

#[derive(Parser)]
#[command(name = "magazine-qa")]
#[command(about = "Ask questions about a PDF magazine using local embeddings and a chat model")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the vector store and the index manifest
    #[arg(long, global = true, env = "MAGAZINE_QA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the document, Ollama and chat model settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a PDF into the vector store
    Index {
        /// PDF to index, defaults to the configured document
        pdf: Option<PathBuf>,
        /// Drop previously indexed chunks before writing
        #[arg(long)]
        recreate: bool,
    },
    /// Ask a single question, reading the API key from OPENAI_API_KEY
    Ask {
        /// The question to answer
        question: String,
    },
    /// Start an interactive question session
    Chat,
    /// Show the state of Ollama, the vector store and the index manifest
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_config_dir().map_err(|e| QaError::Config(e.to_string()))?,
    };

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&Config::load(&data_dir)?);
        } else {
            run_interactive_config(&data_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&data_dir)?;
    match cli.command {
        Commands::Index { pdf, recreate } => {
            index_document(&config, pdf, recreate).await?;
        }
        Commands::Ask { question } => {
            ask_question(&config, &question).await?;
        }
        Commands::Chat => {
            run_chat(&config).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
