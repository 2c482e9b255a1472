use std::path::PathBuf;
use std::time::Duration;

use console::style;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{Database, IndexedDocument, VectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::indexer::{IndexOptions, Indexer};
use crate::llm::{API_KEY_ENV, ApiKey, ChatGenerator, OpenAiClient};
use crate::query::{Answer, QueryPipeline};
use crate::session::Session;
use crate::{QaError, Result};


/// Index the given PDF, or the configured one
#[inline]
pub async fn index_document(config: &Config, pdf: Option<PathBuf>, recreate: bool) -> Result<()> {
    let embedder = connect_embedder(config)?;
    let indexer = Indexer::new(config.clone(), embedder).await?;
    let options = IndexOptions { recreate };

    let stats = match pdf {
        Some(path) => {
            println!("Indexing {}", style(path.display()).cyan());
            indexer.index_file(&path, options).await?
        }
        None => {
            println!(
                "Indexing {} ({})",
                style(&config.document.title).cyan(),
                config.document.pdf_path.display()
            );
            indexer.index_configured(options).await?
        }
    };

    println!("{}", style("✓ Indexing complete").green());
    println!("  Pages loaded: {}", stats.pages_loaded);
    println!("  Pages with text: {}", stats.pages_with_text);
    println!("  Chunks written: {}", stats.chunks_written);
    println!("  Duration: {:.1?}", stats.duration);
    if stats.previously_indexed && !recreate {
        println!(
            "{}",
            style("⚠ This file was indexed before; run `index --recreate` to rebuild without duplicates")
                .yellow()
        );
    }

    Ok(())
}

/// Answer a single question using the key from the environment
#[inline]
pub async fn ask_question(config: &Config, question: &str) -> Result<()> {
    let api_key = ApiKey::from_env()?.ok_or(QaError::MissingCredential)?;
    let pipeline = open_pipeline(config).await?;

    let spinner = answer_spinner();
    let answer = pipeline.ask(question, &[], Some(&api_key)).await;
    spinner.finish_and_clear();

    print_answer(&answer?);
    Ok(())
}

/// Interactive question loop
///
/// Errors from individual questions are reported and the loop continues;
/// only prompt failures end the session.
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    let pipeline = open_pipeline(config).await?;

    let mut session = Session::new(config.session.max_history);
    match ApiKey::from_env() {
        Ok(Some(key)) => {
            info!("Using API key from {}", API_KEY_ENV);
            session = session.with_api_key(Some(key));
        }
        Ok(None) => prompt_for_key(&mut session)?,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            prompt_for_key(&mut session)?;
        }
    }

    eprintln!(
        "{}",
        style(format!("{} Q&A", config.document.title)).bold().cyan()
    );
    eprintln!("Ask about the contents of {}.", config.document.title);
    eprintln!("Commands: /history, /key, /clear, quit");
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)?;

        match line.trim() {
            "" => {}
            "quit" | "exit" | "q" => break,
            "/history" => print_history(&session),
            "/key" => prompt_for_key(&mut session)?,
            "/clear" => {
                session.clear();
                eprintln!("History cleared.");
            }
            question => {
                let spinner = answer_spinner();
                let result = session.ask(&pipeline, question).await;
                spinner.finish_and_clear();

                match result {
                    Ok(answer) => {
                        print_answer(&answer);
                        print_history(&session);
                    }
                    Err(QaError::MissingCredential) => {
                        eprintln!(
                            "{} No API key set. Use /key to enter one.",
                            style("✗").red()
                        );
                    }
                    Err(e) => eprintln!("{} {}", style("✗").red(), e),
                }
            }
        }
    }

    Ok(())
}

/// Show Ollama health, vector store contents and the index manifest
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Magazine QA Status").bold());
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama:");
    match OllamaClient::new(&config.ollama).map(|c| c.with_retry_attempts(1)) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
            }
            Err(e) => println!("   ⚠️  Unavailable: {:#}", e),
        },
        Err(e) => println!("   ❌ Invalid configuration: {:#}", e),
    }

    println!();
    println!("🔍 Vector store ({}):", config.vector_database_path().display());
    match VectorStore::open_for_read(config).await {
        Ok(store) => {
            println!("   🔢 Dimension: {}", store.vector_dimension());
            match store.count_embeddings().await {
                Ok(count) => println!("   📦 Chunks: {}", count),
                Err(e) => println!("   ❌ Could not count chunks: {}", e),
            }
        }
        Err(QaError::StoreNotIndexed(_)) => {
            println!("   💤 Not indexed yet. Run `magazine-qa index`.");
        }
        Err(e) => println!("   ❌ {}", e),
    }

    println!();
    println!("🗄️  Index manifest:");
    if !config.database_path().exists() {
        println!("   No indexing runs recorded.");
        return Ok(());
    }

    let database = Database::new(config.database_path())
        .await
        .map_err(|e| QaError::Database(format!("{e:#}")))?;
    let runs = database
        .list_indexed_documents()
        .await
        .map_err(|e| QaError::Database(format!("{e:#}")))?;

    if runs.is_empty() {
        println!("   No indexing runs recorded.");
        return Ok(());
    }
    for run in &runs {
        println!(
            "   {} {} ({} pages, {} chunks, {} / {}d, sha256 {})",
            run.indexed_date.format("%Y-%m-%d %H:%M:%S"),
            run.source_path,
            run.page_count,
            run.chunk_count,
            run.embedding_model,
            run.embedding_dimension,
            run.short_hash()
        );
    }
    let total_chunks = database
        .total_indexed_chunks()
        .await
        .map_err(|e| QaError::Database(format!("{e:#}")))?;
    println!("   📦 {} runs, {} chunks recorded", runs.len(), total_chunks);

    Ok(())
}

fn connect_embedder(config: &Config) -> Result<OllamaClient> {
    let client = OllamaClient::new(&config.ollama)?;
    client
        .health_check()
        .map_err(|e| QaError::Network(format!("{e:#}")))?;
    Ok(client)
}

async fn open_pipeline(config: &Config) -> Result<QueryPipeline<OllamaClient, OpenAiClient>> {
    let embedder = OllamaClient::new(&config.ollama)?;
    let generator = OpenAiClient::new(&config.openai)?;
    warn_if_model_changed(config, &embedder).await;

    info!(
        "Answering with {} over {} embeddings",
        generator.model_name(),
        embedder.model_name()
    );
    QueryPipeline::open(config, embedder, generator).await
}

/// The index must be queried with the model that built it
async fn warn_if_model_changed(config: &Config, embedder: &impl Embedder) {
    if !config.database_path().exists() {
        return;
    }

    let latest = match Database::new(config.database_path()).await {
        Ok(database) => database.latest_indexed_document().await,
        Err(e) => Err(e),
    };

    match latest {
        Ok(Some(run)) => {
            if let Some(message) = model_change_warning(&run, embedder) {
                warn!("{}", message);
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Could not read index manifest: {:#}", e),
    }
}

/// Describe how the embedder differs from the one that built `run`, if at all
#[inline]
pub fn model_change_warning(run: &IndexedDocument, embedder: &impl Embedder) -> Option<String> {
    let dimension_changed = !usize::try_from(run.embedding_dimension)
        .is_ok_and(|dimension| dimension == embedder.dimension());

    if run.embedding_model == embedder.model_name() && !dimension_changed {
        return None;
    }
    Some(format!(
        "Index was built with {} ({}d) but queries use {} ({}d); results may be poor. Run `magazine-qa index --recreate`",
        run.embedding_model,
        run.embedding_dimension,
        embedder.model_name(),
        embedder.dimension()
    ))
}

fn prompt_for_key(session: &mut Session) -> Result<()> {
    loop {
        let raw = Password::new()
            .with_prompt(format!("OpenAI API key (or set {API_KEY_ENV}, empty to skip)"))
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)?;

        if raw.trim().is_empty() {
            eprintln!("No key entered. Questions will fail until /key is used.");
            return Ok(());
        }

        match session.set_credential(&raw) {
            Ok(()) => {
                eprintln!("{}", style("✓ API key set for this session").green());
                return Ok(());
            }
            Err(e) => eprintln!("{} {}", style("✗").red(), e),
        }
    }
}

fn answer_spinner() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message("Finding an answer...");
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.text.trim());

    let pages = answer.source_pages();
    if !pages.is_empty() {
        let pages: Vec<String> = pages.iter().map(u32::to_string).collect();
        println!("{}", style(format!("Sources: pages {}", pages.join(", "))).dim());
    }
    println!();
}

fn print_history(session: &Session) {
    if session.history().is_empty() {
        eprintln!("No questions asked yet.");
        return;
    }
    println!("{}", style("Conversation History").bold());
    println!("{}", session.history().render());
    println!();
}

fn prompt_error(error: dialoguer::Error) -> QaError {
    QaError::Other(anyhow::Error::new(error).context("Terminal prompt failed"))
}
