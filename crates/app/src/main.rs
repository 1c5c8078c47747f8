use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_chat_core::{
    discover_pdf_files, Answer, AnswerEngine, DocumentStore, EmbeddingConfig, EmbeddingProvider,
    IngestionPipeline, LopdfExtractor, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_ENDPOINT,
    DEFAULT_EMBEDDING_MODEL,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding endpoint (Ollama-style /api/embeddings).
    #[arg(long, env = "DOC_CHAT_EMBED_ENDPOINT", default_value = DEFAULT_EMBEDDING_ENDPOINT)]
    embed_endpoint: String,

    /// Embedding model name.
    #[arg(long, env = "DOC_CHAT_EMBED_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embed_model: String,

    /// Embedding vector size.
    #[arg(long, env = "DOC_CHAT_EMBED_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embed_dimensions: usize,

    /// Skip the embedding endpoint and use the local hashed embedder.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Maximum accepted document size in bytes.
    #[arg(long, env = "DOC_CHAT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Load documents and answer a single question.
    Ask {
        /// The question to answer.
        question: String,
        /// Document file to load; repeatable.
        #[arg(long = "doc")]
        docs: Vec<PathBuf>,
        /// Folder to scan recursively for PDFs.
        #[arg(long)]
        folder: Option<PathBuf>,
        /// Print the full answer record as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Interactive session: load documents, then ask questions on stdin.
    Chat {
        /// Folder to scan recursively for PDFs at startup.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
}

/// Boundary checks applied before a file reaches the ingestion pipeline.
struct UploadPolicy {
    max_bytes: u64,
}

impl UploadPolicy {
    fn check(&self, path: &Path) -> anyhow::Result<()> {
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        anyhow::ensure!(is_pdf, "only PDF files are supported: {}", path.display());

        let size = std::fs::metadata(path)
            .with_context(|| format!("unable to stat {}", path.display()))?
            .len();
        anyhow::ensure!(
            size <= self.max_bytes,
            "{} exceeds the {} byte upload limit",
            path.display(),
            self.max_bytes
        );
        Ok(())
    }
}

struct Session {
    store: Arc<DocumentStore>,
    pipeline: IngestionPipeline,
    engine: AnswerEngine,
    policy: UploadPolicy,
}

impl Session {
    async fn load_document(&self, path: &Path) -> anyhow::Result<String> {
        self.policy.check(path)?;
        let id = self
            .pipeline
            .ingest(path, None)
            .await
            .with_context(|| format!("failed to process {}", path.display()))?;
        Ok(id)
    }

    /// Loads every PDF under the folder, skipping files that fail the
    /// policy or the pipeline.
    async fn load_folder(&self, folder: &Path) -> usize {
        let mut loaded = 0;
        for path in discover_pdf_files(folder) {
            match self.load_document(&path).await {
                Ok(id) => {
                    println!("loaded {} -> {id}", path.display());
                    loaded += 1;
                }
                Err(error) => warn!(path = %path.display(), %error, "skipping document"),
            }
        }
        loaded
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "doc-chat boot"
    );

    let config = EmbeddingConfig {
        endpoint: (!cli.offline).then(|| cli.embed_endpoint.clone()),
        model: cli.embed_model.clone(),
        dimensions: cli.embed_dimensions,
    };
    let provider = Arc::new(EmbeddingProvider::connect(&config).await);
    let store = Arc::new(DocumentStore::new());
    let pipeline = IngestionPipeline::new(
        Box::new(LopdfExtractor),
        Arc::clone(&provider),
        Arc::clone(&store),
    )?;
    let session = Session {
        engine: AnswerEngine::new(Arc::clone(&store), provider),
        store,
        pipeline,
        policy: UploadPolicy {
            max_bytes: cli.max_upload_bytes,
        },
    };

    match cli.command {
        Command::Ask {
            question,
            docs,
            folder,
            json,
        } => {
            for path in &docs {
                let id = session.load_document(path).await?;
                println!("loaded {} -> {id}", path.display());
            }
            if let Some(folder) = &folder {
                session.load_folder(folder).await;
            }

            let answer = session.engine.answer(&question, None).await;
            print_answer(&answer, json)?;
        }
        Command::Chat { folder } => {
            if let Some(folder) = &folder {
                let loaded = session.load_folder(folder).await;
                println!("{loaded} document(s) loaded");
            }
            run_chat(&session).await?;
        }
    }

    Ok(())
}

async fn run_chat(session: &Session) -> anyhow::Result<()> {
    println!(
        "Ask a question, or use /load <path>, /ask <doc-id> <question>, /docs, /quit."
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input == "/quit" {
            break;
        } else if input == "/docs" {
            for record in session.store.list() {
                println!("{}  {}  {}", record.id, record.name, record.source_path);
            }
        } else if let Some(path) = input.strip_prefix("/load ") {
            match session.load_document(Path::new(path.trim())).await {
                Ok(id) => println!("loaded -> {id}"),
                Err(error) => println!("error: {error:#}"),
            }
        } else if let Some(rest) = input.strip_prefix("/ask ") {
            match rest.trim().split_once(' ') {
                Some((doc_id, question)) => {
                    let subset = vec![doc_id.to_string()];
                    let answer = session.engine.answer(question, Some(&subset)).await;
                    print_answer(&answer, false)?;
                }
                None => println!("usage: /ask <doc-id> <question>"),
            }
        } else {
            let answer = session.engine.answer(input, None).await;
            print_answer(&answer, false)?;
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }

    println!("answer: {}", answer.answer);
    println!("confidence: {:.3}", answer.confidence);
    if !answer.source_document.is_empty() {
        println!("source: {}", answer.source_document);
    }
    if !answer.source_text.is_empty() && answer.source_text != answer.answer {
        println!("source_text: {}", answer.source_text);
    }
    Ok(())
}
