use std::sync::Arc;

use claim_flow::{
    ClaimRecorder, FlowController, FlowRunner, InMemorySessionStore, JsonLinesClaimRecorder,
    LlmNormalizer, Normalizer, PolicyLookup, PostgresClaimRecorder, QuestionCatalog,
    RuleNormalizer,
};
use claims_chat_service::{
    config::ServiceConfig,
    demo,
    service::{AppState, build_router},
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on LOG_FORMAT
fn init_tracing(log_format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "claims_chat_service=debug,claim_flow=debug,tower_http=debug".into()
    });

    match log_format {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

async fn create_recorder(config: &ServiceConfig) -> Arc<dyn ClaimRecorder> {
    if let Some(database_url) = &config.database_url {
        info!("Using PostgreSQL claim storage");
        match PostgresClaimRecorder::connect(database_url).await {
            Ok(recorder) => return Arc::new(recorder),
            Err(e) => {
                error!(
                    "Failed to connect to PostgreSQL: {}. Falling back to JSON-lines files.",
                    e
                );
            }
        }
    }
    info!(claims_dir = %config.claims_dir, "Using JSON-lines claim storage");
    Arc::new(JsonLinesClaimRecorder::new(&config.claims_dir))
}

fn create_normalizer(config: &ServiceConfig) -> Arc<dyn Normalizer> {
    match &config.openrouter_api_key {
        Some(api_key) => {
            info!(model = %config.openrouter_model, "Using LLM answer normalizer");
            Arc::new(LlmNormalizer::new(api_key, &config.openrouter_model))
        }
        None => {
            warn!("OPENROUTER_API_KEY not set, using rule-based answer normalizer");
            Arc::new(RuleNormalizer::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    init_tracing(&config.log_format);

    let policies: Arc<dyn PolicyLookup> = Arc::new(demo::policy_directory());
    let controller = FlowController::new(
        Arc::new(QuestionCatalog::fnol()),
        create_normalizer(&config),
        policies.clone(),
        create_recorder(&config).await,
    )
    .with_timeouts(config.timeouts());
    let runner = FlowRunner::new(Arc::new(controller), Arc::new(InMemorySessionStore::new()));

    let app = build_router(AppState { runner, policies });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
