use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_chat_core::config::{
    DEFAULT_API_BASE, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_TIMEOUT_SECS,
};
use pdf_chat_core::models::DEFAULT_INDEX_PATH;
use pdf_chat_core::{
    load_uploads, process_uploads, CharacterNgramEmbedder, ChatModel, Embedder, GeminiClient,
    GeminiConfig, IndexStore, LopdfExtractor, PipelineConfig, Session,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_EXPORT_FILE: &str = "chat_history.txt";

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Google Generative Language API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Generative Language API base URL
    #[arg(long, env = "PDF_CHAT_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Embedding model name
    #[arg(long, env = "PDF_CHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model name
    #[arg(long, env = "PDF_CHAT_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Embedding backend used for chunks and questions
    #[arg(long, value_enum, default_value_t = EmbedderKind::Gemini)]
    embedder: EmbedderKind,

    /// Location of the persisted index
    #[arg(long, env = "PDF_CHAT_INDEX_PATH", default_value = DEFAULT_INDEX_PATH)]
    index_path: PathBuf,

    /// HTTP timeout for each API call, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Keep the loaded index in memory between questions of one `chat`
    /// session, reloading only when the index file changes
    #[arg(long, env = "PDF_CHAT_CACHE_INDEX", default_value_t = false)]
    cache_index: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index from PDF files and folders, replacing any previous one.
    Ingest {
        /// PDF files, or folders searched recursively for PDFs.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask one question against the persisted index.
    Ask {
        question: String,
    },
    /// Interactive question loop on stdin.
    Chat,
    /// Describe the persisted index.
    Status,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    Gemini,
    /// Offline character-trigram hashing; no API key needed.
    Ngram,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            index_path: self.index_path.clone(),
            cache_index: self.cache_index,
            ..PipelineConfig::default()
        }
    }

    fn gemini_client(&self) -> anyhow::Result<Arc<GeminiClient>> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .context("GOOGLE_API_KEY is not set; pass --api-key or add it to .env")?;

        let config = GeminiConfig::new(api_key)?
            .with_api_base(&self.api_base)?
            .with_models(&self.embedding_model, &self.chat_model)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        Ok(Arc::new(GeminiClient::new(config)?))
    }

    fn embedder(&self, gemini: Option<&Arc<GeminiClient>>) -> anyhow::Result<Arc<dyn Embedder>> {
        match (self.embedder, gemini) {
            (EmbedderKind::Ngram, _) => Ok(Arc::new(CharacterNgramEmbedder::default())),
            (EmbedderKind::Gemini, Some(client)) => Ok(client.clone()),
            (EmbedderKind::Gemini, None) => Ok(self.gemini_client()?),
        }
    }

    fn session(&self) -> anyhow::Result<Session> {
        let gemini = self.gemini_client()?;
        let embedder = self.embedder(Some(&gemini))?;
        let chat_model: Arc<dyn ChatModel> = gemini;
        Ok(Session::new(
            self.pipeline_config(),
            Box::new(LopdfExtractor),
            embedder,
            chat_model,
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match &cli.command {
        Command::Ingest { paths } => ingest(&cli, paths).await?,
        Command::Ask { question } => {
            let mut session = cli.session()?;
            println!("{}", session.ask(question).await);
        }
        Command::Chat => chat(cli.session()?).await?,
        Command::Status => status(&cli)?,
    }

    Ok(())
}

async fn ingest(cli: &Cli, paths: &[PathBuf]) -> anyhow::Result<()> {
    let loaded = load_uploads(paths);
    for skipped in &loaded.skipped_files {
        println!("skipped {}: {}", skipped.name, skipped.reason);
    }
    if loaded.files.is_empty() {
        anyhow::bail!("no readable PDF files found under the given paths");
    }

    let embedder = cli.embedder(None)?;
    let config = cli.pipeline_config();
    let store = IndexStore::new(&config.index_path);

    let report = match process_uploads(
        &loaded.files,
        &LopdfExtractor,
        &config.ingestion,
        embedder.as_ref(),
        &store,
    )
    .await
    {
        Ok(report) => report,
        Err(error) => {
            warn!(%error, "index build failed");
            anyhow::bail!(error.user_message());
        }
    };

    for skipped in &report.skipped_files {
        println!("skipped {}: {}", skipped.name, skipped.reason);
    }
    println!(
        "{} chunks indexed from {} file(s), {} page(s), at {}",
        report.chunk_count,
        report.sources.len(),
        report.page_count(),
        report.built_at.to_rfc3339()
    );
    Ok(())
}

async fn chat(mut session: Session) -> anyhow::Result<()> {
    println!("Ask a question about your documents. Commands: /clear, /export [file], /history, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        if let Err(error) = std::io::stdout().flush() {
            warn!(%error, "failed to flush prompt");
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/clear", _) => {
                session.clear();
                println!("Chat history cleared.");
            }
            ("/history", _) => {
                if session.history().is_empty() {
                    println!("No questions asked yet.");
                } else {
                    println!("{}", session.export_history());
                }
            }
            ("/export", target) => {
                let target = match target.trim() {
                    "" => DEFAULT_EXPORT_FILE,
                    other => other,
                };
                println!("{}", export_history_to(&session, target).await);
            }
            _ => println!("{}", session.ask(line).await),
        }
    }

    Ok(())
}

/// Writes the history export and returns the line to show. A failed write
/// is reported, never fatal to the chat loop.
async fn export_history_to(session: &Session, target: &str) -> String {
    match tokio::fs::write(target, session.export_history()).await {
        Ok(()) => format!("Chat history written to {target}."),
        Err(error) => {
            warn!(%error, path = %target, "history export failed");
            format!("Could not write chat history to {target}: {error}")
        }
    }
}

fn status(cli: &Cli) -> anyhow::Result<()> {
    let store = IndexStore::new(&cli.index_path);
    if !store.exists() {
        println!(
            "No index at {}. Run `pdf-chat ingest <PATH>...` first.",
            store.path().display()
        );
        return Ok(());
    }

    let index = store
        .load()
        .map_err(|error| anyhow::anyhow!(error.user_message()))?;
    println!("index: {}", store.path().display());
    println!("chunks: {}", index.len());
    println!("embedding model: {} ({} dimensions)", index.embedding_model, index.dimensions);
    println!("built at: {}", index.built_at.to_rfc3339());
    for source in &index.sources {
        println!("source: {} ({} pages, sha256 {})", source.filename, source.pages, source.checksum);
    }
    Ok(())
}
