use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::{AppContext, Answerer};
use crate::config::{API_KEY_ENV, Config};
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;
use crate::indexer::{BuildSummary, ConsistencyValidator};
use crate::ui;

fn load_config(base_dir: &Path) -> Result<Config> {
    Config::load(base_dir)
        .with_context(|| format!("Failed to load configuration from {}", base_dir.display()))
}

async fn prepare_app(config: &Config, rebuild: bool) -> Result<AppContext> {
    if rebuild {
        let (app, summary) = AppContext::build(config).await?;
        print_build_summary(&summary);
        Ok(app)
    } else {
        Ok(AppContext::open(config).await?)
    }
}

fn print_build_summary(summary: &BuildSummary) {
    println!("✅ Index build #{} completed", summary.build_id);
    println!("   📄 Documents: {}", summary.documents);
    println!("   🧩 Chunks: {}", summary.chunks);
    println!("   🔢 Dimension: {}", summary.dimension);
    println!("   ⏱️  Duration: {:.1?}", summary.duration);

    if !summary.failed_urls.is_empty() {
        println!("   ⚠️  Skipped {} sources:", summary.failed_urls.len());
        for failure in &summary.failed_urls {
            println!("      • {} ({})", failure.url, failure.reason);
        }
    }
}

/// Load every configured source and rebuild the index from scratch
#[inline]
pub async fn build_index(base_dir: &Path) -> Result<()> {
    let config = load_config(base_dir)?;
    info!("Building index in {}", base_dir.display());

    println!(
        "🔄 Building index from {} sources...",
        config.loader.urls.len()
    );
    let (app, summary) = AppContext::build(&config).await?;
    print_build_summary(&summary);
    app.close().await;

    Ok(())
}

/// Serve the web form, optionally rebuilding the index first
#[inline]
pub async fn serve(base_dir: &Path, bind: Option<String>, rebuild: bool) -> Result<()> {
    let mut config = load_config(base_dir)?;
    if let Some(bind) = bind {
        config.ui.bind = bind;
        config.validate().context("Invalid bind address")?;
    }

    let app = Arc::new(prepare_app(&config, rebuild).await?);
    println!("🌐 {} running at http://{}", config.ui.title, config.ui.bind);

    let result = ui::serve(Arc::clone(&app) as Arc<dyn Answerer>, &config.ui).await;
    app.close().await;
    result?;

    Ok(())
}

/// Answer a single question in the terminal
#[inline]
pub async fn ask(base_dir: &Path, question: &str, rebuild: bool) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        warn!("Ignoring empty question");
        println!("Please enter a question.");
        return Ok(());
    }

    let config = load_config(base_dir)?;
    let app = prepare_app(&config, rebuild).await?;

    println!("Your question: {}", question);
    let spinner = crate::progress_bar(0, "{spinner} {msg}");
    spinner.set_message("Searching...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = app.answer(question).await;
    spinner.finish_and_clear();
    app.close().await;
    let answer = result?;

    println!();
    println!("Answer");
    println!("{}", answer.text);
    println!();
    println!("Sources");
    if answer.sources.is_empty() {
        println!("   (none)");
    }
    for source in &answer.sources {
        println!("   • {}", source);
    }

    Ok(())
}

/// Report configuration, stores, latest build and consistency
#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let config = load_config(base_dir).unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        Config {
            base_dir: base_dir.to_path_buf(),
            ..Config::default()
        }
    });

    println!("📊 News QA Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    println!("   📁 Base directory: {}", base_dir.display());
    println!("   🌐 Sources: {}", config.loader.urls.len());
    println!(
        "   🤖 Models: {} / {}",
        config.openai.embedding_model, config.openai.chat_model
    );
    match Config::api_key() {
        Ok(_) => println!("   🔑 {}: set", API_KEY_ENV),
        Err(_) => println!("   ❌ {}: missing", API_KEY_ENV),
    }

    println!();
    println!("🗄️  Docstore Status:");
    let database = match Database::open_existing(&config.database_path()).await {
        Ok(db) => {
            println!("   ✅ SQLite: {}", config.database_path().display());
            Some(db)
        }
        Err(e) => {
            println!("   ❌ SQLite: {:#}", e);
            None
        }
    };

    println!("🔍 Vector Index Status:");
    let vector_store = match VectorStore::open_existing(&config.vector_database_path()).await {
        Ok(store) => {
            match store.count().await {
                Ok(count) => println!("   ✅ LanceDB: {} vectors", count),
                Err(e) => println!("   ⚠️  LanceDB: opened but unreadable - {}", e),
            }
            Some(store)
        }
        Err(e) => {
            println!("   ❌ LanceDB: {}", e);
            None
        }
    };

    let Some(database) = database else {
        println!();
        println!("📭 No index built yet. Run `news-qa build` to create one.");
        return Ok(());
    };

    println!();
    println!("🏗️  Latest Build:");
    match database.latest_build().await? {
        Some(build) => {
            println!("   #{} {}", build.id, build.status);
            println!(
                "   📄 {} documents, 🧩 {} chunks",
                build.document_count, build.chunk_count
            );
            println!("   🤖 Embedding model: {}", build.embedding_model);
            if let Some(dimension) = build.dimension {
                println!("   🔢 Dimension: {}", dimension);
            }
            println!("   🕐 Started: {}", build.started_date);
            if let Some(duration) = build.duration() {
                println!("   ⏱️  Took: {}s", duration.num_seconds());
            }
            if let Some(message) = &build.error_message {
                println!("   ❌ Error: {}", message);
            }
        }
        None => println!("   📭 No builds recorded"),
    }

    println!();
    println!("📚 Documents:");
    let counts = database.chunk_counts_by_document().await?;
    if counts.is_empty() {
        println!("   📭 No documents stored");
    }
    for document in &counts {
        println!(
            "   • {} ({} chunks){}",
            document.source_url,
            document.chunk_count,
            document
                .title
                .as_deref()
                .map(|title| format!(" - {}", title))
                .unwrap_or_default()
        );
    }

    if let Some(store) = &vector_store {
        println!();
        println!("🔍 Index Consistency:");
        match ConsistencyValidator::new(&database, store)
            .validate_consistency()
            .await
        {
            Ok(report) => {
                if report.is_consistent {
                    println!("   ✅ Docstore and vector index are consistent");
                } else {
                    println!("   ⚠️  {}", report.summary());
                }
                println!("   📊 Docstore chunks: {}", report.docstore_chunks);
                println!("   📊 Vector rows: {}", report.vector_rows);
            }
            Err(e) => println!("   ❌ Failed to check consistency: {}", e),
        }
    }

    database.close().await;
    Ok(())
}
