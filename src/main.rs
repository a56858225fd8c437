use clap::{Parser, Subcommand};
use news_qa::Result;
use news_qa::commands::{ask, build_index, serve, show_status};
use news_qa::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "news-qa")]
#[command(about = "Ask questions about Kenyan business news, answered from the indexed articles")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the index (defaults to ~/.news-qa)
    #[arg(long, global = true, env = "NEWS_QA_HOME")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model endpoint and news sources
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Fetch the news sources and rebuild the index
    Build,
    /// Start the web search form
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8501
        #[arg(long)]
        bind: Option<String>,
        /// Rebuild the index before serving
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer one question in the terminal
    Ask {
        question: String,
        /// Rebuild the index before answering
        #[arg(long)]
        rebuild: bool,
    },
    /// Show configuration, index and consistency status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => Config::default_dir().map_err(|e| news_qa::QaError::Config(e.to_string()))?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Build => {
            build_index(&base_dir).await?;
        }
        Commands::Serve { bind, rebuild } => {
            serve(&base_dir, bind, rebuild).await?;
        }
        Commands::Ask { question, rebuild } => {
            ask(&base_dir, &question, rebuild).await?;
        }
        Commands::Status => {
            show_status(&base_dir).await?;
        }
    }

    Ok(())
}
