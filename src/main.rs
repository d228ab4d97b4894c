use anyhow::{Context, Result};
use cascade_translator::audit::{AuditSink, PgAuditStore};
use cascade_translator::cache::DistributedCache;
use cascade_translator::config::Config;
use cascade_translator::redis_cache::RedisCache;
use cascade_translator::server::{create_router, AppState, Limits};
use cascade_translator::Translator;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (absent in production)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cascade_translator=info".parse()?),
        )
        .init();

    info!("Starting translation service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    // L2 and the audit store are optional; the service runs degraded without them
    let l2: Option<Arc<dyn DistributedCache>> = match &config.redis_url {
        Some(url) if config.enable_l2_cache => match RedisCache::connect(url, config.l2_timeout())
            .await
        {
            Ok(cache) => {
                info!("Connected to Redis L2 cache");
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!("Redis unavailable, continuing without L2 cache: {}", e);
                None
            }
        },
        _ => None,
    };

    let audit: Option<Arc<dyn AuditSink>> = match &config.database_url {
        Some(url) => match PgAuditStore::connect(url).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!("Audit database unavailable, translations won't be recorded: {}", e);
                None
            }
        },
        None => None,
    };

    let translator = Translator::from_config(&config, l2)?;
    let limits = Limits {
        max_text_length: config.max_text_length,
        max_batch_size: config.max_batch_size,
    };
    let app = create_router(AppState::new(Arc::new(translator), audit, limits));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
