use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

mod domain;
mod application;
mod infrastructure;

use application::messaging::{MessageDispatcher, OutcomeReporter};
use application::services::CloudSessionManager;
use domain::traits::{Bot, EventSource};
use infrastructure::adapters::{ConsoleAdapter, MatrixAdapter};
use infrastructure::config::Config;
use infrastructure::remarkable::RemarkableCloud;
use infrastructure::renderer::ChromeRenderer;
use infrastructure::storage::JsonCredentialStore;

/// Pause before retrying after a failed poll
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "remarkable-bot")]
#[command(about = "Matrix bot that sends PDFs and web pages to a reMarkable tablet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Matrix access token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            run_bot(cli.config, cli.token);
        }
        Commands::Version => {
            println!("remarkable-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn run_bot(config_path: String, token_override: Option<String>) {
    // Load config
    let mut config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    if let Some(token) = token_override {
        config.matrix.access_token = Some(token);
    }

    tracing::info!("Starting remarkable-bot: {}", config.bot.name);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return;
        }
    };

    rt.block_on(async {
        let store = Arc::new(JsonCredentialStore::new(config.data_path()));
        let cloud = Arc::new(RemarkableCloud::new(config.remarkable.clone()));
        let session = Arc::new(CloudSessionManager::new(cloud, store));
        session.load().await;

        let renderer = Arc::new(ChromeRenderer::new(config.renderer.clone()));
        let reporter = OutcomeReporter::new(config.bot.greeting.clone());

        if let Some(token) = config.access_token() {
            let mut bot = MatrixAdapter::new(
                config.matrix.homeserver_url.clone(),
                token,
                config.bot.display_name.clone(),
            );
            if let Err(e) = bot.start().await {
                tracing::error!("Failed to start Matrix bot: {}", e);
                return;
            }

            let events = bot.event_source(config.bot_session_file(), config.matrix.sync_timeout_ms).await;
            let dispatcher = MessageDispatcher::new(Arc::new(bot), session, renderer, reporter);
            run_event_loop(events, Arc::new(dispatcher)).await;
        } else {
            // Console bot (dev mode)
            let mut bot = ConsoleAdapter::new();
            if let Err(e) = bot.start().await {
                tracing::error!("Failed to start console bot: {}", e);
                return;
            }

            let events = bot.event_source();
            let dispatcher = MessageDispatcher::new(Arc::new(bot), session, renderer, reporter);
            run_event_loop(events, Arc::new(dispatcher)).await;
        }
    });
}

/// Pull events until the source is exhausted, handling each one on its own task
async fn run_event_loop(mut events: impl EventSource, dispatcher: Arc<MessageDispatcher>) {
    tracing::info!("Starting message loop...");
    let mut in_flight: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    loop {
        in_flight.retain(|task| !task.is_finished());

        match events.next_events().await {
            Ok(Some(batch)) => {
                if !batch.is_empty() {
                    tracing::debug!("Received {} events", batch.len());
                }
                for event in batch {
                    let dispatcher = dispatcher.clone();
                    in_flight.push(tokio::spawn(async move {
                        dispatcher.handle(event).await;
                    }));
                }
            }
            Ok(None) => {
                tracing::info!("Event source closed, waiting for {} pending events", in_flight.len());
                for task in in_flight {
                    if let Err(e) = task.await {
                        tracing::error!("Event handler panicked: {}", e);
                    }
                }
                break;
            }
            Err(e) => {
                tracing::error!("Failed to fetch events: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

fn init_config() {
    let config = Config::default();
    match serde_yaml::to_string(&config) {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to serialize default config: {}", e),
    }
}
