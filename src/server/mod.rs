//! Read-only HTTP query service over the store

pub mod cache;
pub mod error;
pub mod page;
pub mod routes;
pub mod state;
pub mod store;

pub use cache::{CachePolicy, LookupCache};
pub use state::AppState;
pub use store::{Boundary, BucketLists, College, CollegeFilter, DemographicsSummary, Store, ZipDetail};

use anyhow::{Context, Result};
use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub cache: CachePolicy,
}

pub fn router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let mut app = Router::new()
        .route("/", get(routes::index))
        .route("/get_colleges", get(routes::colleges))
        .route("/api/colleges", get(routes::colleges))
        .route("/get_boundaries", get(routes::boundaries))
        .route("/api/demographics", get(routes::demographics))
        .route("/api/buckets", get(routes::buckets))
        .route("/api/zip/:zip_code", get(routes::zip_detail));

    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }

    app.fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind, optionally warm the cache, and serve until Ctrl+C or SIGTERM
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::new(Store::new(config.db_path.clone()), config.cache);

    if !config.db_path.is_file() {
        warn!(db = ?config.db_path, "database not found; queries will return 503 until it exists");
    }

    if config.cache == CachePolicy::Eager {
        state
            .warm()
            .await
            .context("Failed to warm lookup cache")?;
    }

    let static_dir = config.static_dir.filter(|dir| {
        let exists = dir.is_dir();
        if !exists {
            warn!(dir = ?dir, "static directory not found; /static is disabled");
        }
        exists
    });

    let app = router(state, static_dir);
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, db = ?config.db_path, cache = ?config.cache, "query service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("query service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
