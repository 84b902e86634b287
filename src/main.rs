//! Grounded Chat - Retrieval-grounded streaming chat with durable history.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grounded_chat::ai::{GenerationError, Provider};
use grounded_chat::config::{AppConfig, ConfigError, ConfigLoader};
use grounded_chat::document::{DocumentError, DocumentStore, JsonFileDocumentStore};
use grounded_chat::history::{ConversationKey, HistoryError, JsonFileStore, KeyedStore};
use grounded_chat::knowledge::KnowledgeIndex;
use grounded_chat::pipeline::{ChatCore, CoreError};
use grounded_chat::server::{AppState, ChatServer, ServerError, SERVICE_CATEGORY};

#[derive(Parser)]
#[command(
    name = "grounded-chat",
    about = "Retrieval-grounded streaming chat with durable history",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a config file (overrides the default search paths).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve {
        /// Host address to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask one question and stream the reply to stdout.
    Ask {
        /// The prompt to send.
        prompt: String,
        /// Conversation category.
        #[arg(long, default_value = SERVICE_CATEGORY)]
        category: String,
        /// Conversation id.
        #[arg(long, default_value = "cli")]
        chat_id: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("Failed to write reply: {0}")]
    Output(#[from] std::io::Error),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Durable stores opened for one process run.
struct Stores {
    history: Arc<JsonFileStore>,
    documents: Arc<JsonFileDocumentStore>,
}

impl Stores {
    async fn open(config: &AppConfig) -> Result<Self, CliError> {
        let history = Arc::new(JsonFileStore::new(config.storage.history_path()));
        let documents = Arc::new(JsonFileDocumentStore::new(config.storage.documents_path()));
        history.load_all().await?;
        documents.load_all().await?;
        Ok(Self { history, documents })
    }

    async fn flush(&self) -> Result<(), CliError> {
        self.history.flush().await?;
        self.documents.flush().await?;
        tracing::info!("Stores flushed");
        Ok(())
    }
}

async fn build_core(config: &AppConfig, stores: &Stores) -> ChatCore {
    let index = KnowledgeIndex::load(&config.storage.kb_path()).await;
    ChatCore::new(
        Arc::new(index),
        stores.documents.clone(),
        stores.history.clone(),
        config.retrieval.clone(),
    )
    .with_persona(config.model.persona.clone())
}

async fn serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), CliError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let model = Provider::from_config(&config.model)?;
    let stores = Stores::open(&config).await?;
    let core = Arc::new(build_core(&config, &stores).await);

    let server = ChatServer::new(AppState::new(Arc::clone(&core), Arc::new(model)))
        .with_config(config.server.clone());
    let cancel = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, stopping");
        }
        cancel.cancel();
    });

    let result = server.run().await;
    core.drain_replies(Duration::from_secs(config.server.shutdown_grace_secs)).await;
    stores.flush().await?;
    result.map_err(CliError::from)
}

async fn ask(
    config: AppConfig,
    prompt: String,
    category: String,
    chat_id: String,
) -> Result<(), CliError> {
    let model = Provider::from_config(&config.model)?;
    let stores = Stores::open(&config).await?;
    let core = build_core(&config, &stores).await;

    let key = ConversationKey::new(category, chat_id);
    let mut reply = core.chat(&key, &prompt, &model).await?;

    let mut stdout = std::io::stdout();
    let mut outcome = Ok(());
    while let Some(chunk) = reply.next().await {
        match chunk {
            Ok(text) => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            Err(e) => {
                outcome = Err(CliError::from(e));
                break;
            }
        }
    }
    writeln!(stdout)?;

    let state = reply.settled().await;
    tracing::debug!(state = ?state, "Reply settled");
    stores.flush().await?;
    outcome
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = match cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Ask {
            prompt,
            category,
            chat_id,
        } => ask(config, prompt, category, chat_id).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
