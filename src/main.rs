//! MyFree Agent - private personal assistant chat service
//!
//! A Rust backend driving a single conversation through a turn state
//! machine, with replies produced by a locally hosted text generator.

mod api;
mod config;
mod conversation;
mod generator;
mod prompt;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::AppConfig;
use generator::{GenerationClient, HttpGeneratorFactory};
use prompt::PromptBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "myfree_agent=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;
    tracing::info!(
        generator_url = %config.generator_url,
        model = %config.model.model_id,
        quantized = config.model.quantized,
        timeout_secs = ?config.generation_timeout.map(|t| t.as_secs()),
        history_window = ?config.max_history_messages,
        "Configuration loaded"
    );

    // Generation capability, loaded lazily by the runtime
    let mut factory = HttpGeneratorFactory::new(&config.generator_url);
    if let Some(limit) = config.generation_timeout {
        factory = factory.with_request_timeout(limit);
    }
    let client = GenerationClient::new(Arc::new(factory), config.model.clone())
        .with_options(config.options)
        .with_timeout(config.generation_timeout);
    let prompt = PromptBuilder::default().with_history_window(config.max_history_messages);

    let chat = runtime::spawn_conversation(Arc::new(client), prompt);
    let state = AppState::new(chat);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(cors).layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("MyFree Agent server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
