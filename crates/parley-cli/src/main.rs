use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::{
    ChatEngine, MemoryMediaStore, PersistClientBuilder, ProviderFactory, ThreadConfig,
};
use parley_cli::{
    commands::{self, Command},
    config::Config,
    session::Session,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting Parley CLI");

    // Initialize completion provider
    let provider_config = config
        .provider_config()
        .map_err(|e| anyhow::anyhow!("Invalid provider configuration: {}", e))?;
    tracing::info!("Using {:?} completion provider", provider_config.provider_type());
    let provider = ProviderFactory::create(provider_config)?;

    // Initialize persistence
    let mut persist = PersistClientBuilder::new();
    if let Some(uri) = &config.mongodb_uri {
        persist = persist
            .mongodb_uri(uri.clone())
            .database(config.storage.database.clone());
    }
    let persist = persist.build().await?;

    // Build the chat engine
    let engine = ChatEngine::builder()
        .provider(provider)
        .persist(persist.clone())
        .media_store(Arc::new(MemoryMediaStore::new()))
        .batcher_config((&config.batcher).into())
        .scheduler_config((&config.summary).into())
        .context_config((&config.context).into())
        .turn_config(config.turn_config())
        .build()?;

    let mut turns = engine.subscribe_turns();
    let mut events = persist.subscribe();
    let mut session = Session::start(
        engine,
        ThreadConfig::from(&config.thread),
        config.storage.page_size,
    )
    .await?;

    println!("parley: thread {} ({})", session.thread().title, session.thread().id);
    println!("type /help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    session.handle(Command::Quit).await?;
                    break;
                };
                let command = match commands::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let quit = command == Command::Quit;
                match session.handle(command).await {
                    Ok(output) => output.iter().for_each(|line| println!("{}", line)),
                    Err(e) => println!("error: {}", e),
                }
                if quit {
                    break;
                }
            }
            outcome = turns.recv() => match outcome {
                Ok(outcome) => session.on_turn(&outcome).iter().for_each(|line| println!("{}", line)),
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Missed {} turn outcomes", skipped),
                Err(RecvError::Closed) => break,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = session.on_event(&event).await {
                        tracing::warn!("Could not refresh history window: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!("Missed {} log events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Parley CLI stopped");
    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout belongs to the conversation
    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}
