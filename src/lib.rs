use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Loader error: {0}")]
    Loader(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Answer error: {0}")]
    Answer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod app;
pub mod chain;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod loader;
pub mod ui;

/// Progress bar on an attended terminal, hidden otherwise
pub(crate) fn progress_bar(len: usize, template: &str) -> indicatif::ProgressBar {
    if !console::user_attended_stderr() {
        return indicatif::ProgressBar::hidden();
    }

    let style = indicatif::ProgressStyle::with_template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner());
    indicatif::ProgressBar::new(len as u64).with_style(style)
}
