use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connecta::api::{
    self,
    middleware::session::{with_sessions, AppState},
};
use connecta::config::Config;
use connecta::db::{self, MemoryStore, PgStore, Store};
use connecta::jobs::maintenance;
use connecta::services::{
    drone_patrol::{PatrolSettings, PatrolSimulator},
    image_analysis::{ImageAnalyzer, UnconfiguredAnalyzer, VisionGatewayAnalyzer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connecta=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Connecta server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let analyzer = build_analyzer(&config)?;

    let secure_cookies = config.base_url.starts_with("https://");

    // The scheduler handle lives as long as the server
    let (app, _scheduler) = if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store, data is lost on restart");

        let store: Arc<dyn Store> = Arc::new(MemoryStore::seeded());
        let router = build_router(store.clone(), &config, analyzer);
        let scheduler = maintenance::start_scheduler(store, &config.maintenance_cron).await?;

        let app = with_sessions(
            router,
            tower_sessions::MemoryStore::default(),
            &config.session_secret,
            secure_cookies,
        );
        (app, scheduler)
    } else {
        // Create database pool
        let pool = db::create_pool(&config.database_url).await?;
        tracing::info!("Database pool created");

        // Run migrations
        db::run_migrations(&pool).await?;
        tracing::info!("Database migrations completed");

        let session_store = PostgresStore::new(pool.clone());
        session_store.migrate().await?;
        tracing::info!("Session store initialized");

        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        let router = build_router(store.clone(), &config, analyzer);
        let scheduler = maintenance::start_scheduler(store, &config.maintenance_cron).await?;

        let app = with_sessions(router, session_store, &config.session_secret, secure_cookies);
        (app, scheduler)
    };

    let app = app.layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_router(store: Arc<dyn Store>, config: &Config, analyzer: Arc<dyn ImageAnalyzer>) -> Router {
    let patrols = PatrolSimulator::new(
        store.clone(),
        analyzer.clone(),
        PatrolSettings {
            detection_delay: config.patrol_detection_delay(),
            reference_point: config.patrol_reference_point(),
            image_urls: config.patrol_image_urls.clone(),
        },
    );

    api::app(AppState {
        store,
        config: config.clone(),
        patrols,
        analyzer,
    })
}

fn build_analyzer(config: &Config) -> anyhow::Result<Arc<dyn ImageAnalyzer>> {
    match (&config.vision_api_url, &config.vision_api_key) {
        (Some(endpoint), Some(api_key)) => {
            let endpoint = url::Url::parse(endpoint)?;
            tracing::info!(endpoint = %endpoint, model = %config.vision_model, "Vision gateway configured");
            Ok(Arc::new(VisionGatewayAnalyzer::new(
                endpoint.as_str(),
                api_key.clone(),
                config.vision_model.clone(),
            )))
        }
        _ => {
            tracing::warn!("VISION_API_URL or VISION_API_KEY missing, image analysis disabled");
            Ok(Arc::new(UnconfiguredAnalyzer))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
