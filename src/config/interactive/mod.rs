
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::Path;

use super::{API_KEY_ENV, Config, ConfigError, LoaderConfig, OpenAiConfig};

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 News QA Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir)?;

    eprintln!("{}", style("Model Provider").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used for embeddings and answers.");
    eprintln!();

    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("News Sources").bold().yellow());
    eprintln!("Pages fetched and indexed on every build.");
    eprintln!();

    configure_sources(&mut config.loader)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if Config::api_key().is_err() {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: {} is not set", API_KEY_ENV)).yellow()
        );
        eprintln!("Export it before running 'news-qa build' or 'news-qa serve'.");
    } else if test_api_connection(&config.openai)? {
        eprintln!("{}", style("✓ Model endpoint reachable!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the model endpoint").yellow()
        );
        eprintln!("You can continue, but building the index will fail until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Model Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    eprintln!("  Temperature: {}", style(config.openai.temperature).cyan());
    eprintln!("  Max Tokens: {}", style(config.openai.max_tokens).cyan());
    eprintln!("  Batch Size: {}", style(config.openai.batch_size).cyan());
    match Config::api_key() {
        Ok(_) => eprintln!("  API Key: {} ({})", style("set").green(), API_KEY_ENV),
        Err(_) => eprintln!("  API Key: {} ({})", style("missing").red(), API_KEY_ENV),
    }

    eprintln!();
    eprintln!("{}", style("Sources:").bold().yellow());
    for url in &config.loader.urls {
        eprintln!("  • {}", style(url).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Pipeline:").bold().yellow());
    eprintln!(
        "  Chunking: {} chars, {} overlap, split on {:?}",
        config.chunking.chunk_size, config.chunking.chunk_overlap, config.chunking.separator
    );
    eprintln!("  Retrieval: top {}", config.retrieval.top_k);
    eprintln!("  Web UI: http://{}", config.ui.bind);

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(base_dir: &Path) -> Result<Config> {
    if base_dir.join("config.toml").exists() {
        let config = Config::load(base_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config::load(base_dir)
    }
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            temp_config.api_url()?;
            Ok(())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(openai.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;

    let max_tokens: u32 = Input::new()
        .with_prompt("Maximum answer tokens")
        .default(openai.max_tokens)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=4096).contains(input) {
                Ok(())
            } else {
                Err("Max tokens must be between 1 and 4096")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(openai.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 2048 {
                Err("Batch size must be 2048 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_embedding_model(embedding_model)?;
    openai.set_chat_model(chat_model)?;
    openai.set_temperature(temperature)?;
    openai.set_max_tokens(max_tokens)?;
    openai.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_sources(loader: &mut LoaderConfig) -> Result<()> {
    let urls: String = Input::new()
        .with_prompt("Source URLs (comma separated)")
        .default(loader.urls.join(", "))
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = LoaderConfig {
                urls: split_urls(input),
                ..LoaderConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    loader.set_urls(split_urls(&urls))?;
    Ok(())
}

fn split_urls(input: &str) -> Vec<String> {
    input
        .split([',', ' ', '\n'])
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

#[expect(clippy::ptr_arg, reason = "signature required by dialoguer validators")]
fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_api_connection(openai: &OpenAiConfig) -> Result<bool> {
    let url = openai.api_url()?.join("models")?;
    let key = Config::api_key()?;

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent
        .get(url.as_str())
        .header("Authorization", &format!("Bearer {}", key))
        .call()
    {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
