//! Carlot Server
//!
//! Serves the car list over a small REST API and, when a channel key is
//! configured, issues a messaging platform channel access token at startup.
//!
//! Storage is either SQLite (embedded) or an in-memory map.

mod extractors;
mod handlers;
mod middleware;
mod services;
mod settings;
mod storage;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use services::{CarCatalog, ChannelTokenService};
use settings::Config;
use storage::{CarStore, Database, MemoryStore, StorageKind};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CarCatalog>,
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Carlot Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_server().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Config loaded: bind={}, storage={}, db={}",
        config.bind_address, config.storage, config.database_path
    );

    if let Some(settings) = config.token.clone() {
        let token = ChannelTokenService::new(settings)
            .fetch_access_token()
            .await
            .context("Failed to fetch channel access token")?;
        info!(
            "Channel access token issued: type={}, expires_in={}s, key_id={}",
            token.token_type, token.expires_in, token.key_id
        );
        debug!("Channel access token: {}", token.access_token);
    }

    let store: Arc<dyn CarStore> = match config.storage {
        StorageKind::Sqlite => Arc::new(
            Database::new(&config.database_path)
                .await
                .context("Failed to initialize database")?,
        ),
        StorageKind::Memory => Arc::new(MemoryStore::new()),
    };

    let catalog = Arc::new(CarCatalog::new(store));
    catalog.seed().await.context("Failed to seed cars")?;

    let state = AppState { catalog };

    info!("Static files directory: {}", config.static_dir.display());
    let app = build_router(state, &config.static_dir);

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/webhook",
            post(handlers::webhook::receive).layer(DefaultBodyLimit::disable()),
        )
        .nest("/api", api_routes())
        // Everything else is a static file
        .fallback_service(ServeDir::new(static_dir))
        .layer(axum::middleware::from_fn(middleware::dump_body))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new().route(
        "/cars",
        get(handlers::cars::list).post(handlers::cars::create),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            warn!("Received SIGTERM, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use carlot_types::Car;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app_with(store: Arc<dyn CarStore>, static_dir: &Path) -> Router {
        let catalog = Arc::new(CarCatalog::new(store));
        catalog.seed().await.unwrap();
        build_router(AppState { catalog }, static_dir)
    }

    async fn sqlite_app() -> Router {
        let db = Database::in_memory().await.unwrap();
        app_with(Arc::new(db), Path::new("static")).await
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = sqlite_app().await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_returns_seeded_cars() {
        let app = sqlite_app().await;

        let response = app
            .oneshot(Request::builder().uri("/api/cars").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cars: Vec<Car> = serde_json::from_value(body_json(response).await).unwrap();
        let rows: Vec<(i64, &str, i64)> = cars
            .iter()
            .map(|c| (c.id, c.name.as_str(), c.year))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, "ヤリス", 2020),
                (2, "キャストスタイル", 2020),
                (3, "フィット", 2019),
            ]
        );
    }

    #[tokio::test]
    async fn test_memory_backend_lists_keyed_object() {
        let app = app_with(Arc::new(MemoryStore::new()), Path::new("static")).await;

        let response = app
            .oneshot(Request::builder().uri("/api/cars").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_object().unwrap().len(), 3);
        assert_eq!(json["3"]["name"], "フィット");
    }

    #[tokio::test]
    async fn test_create_echoes_with_fixed_id() {
        let app = sqlite_app().await;

        let response = app
            .clone()
            .oneshot(post_json("/api/cars", r#"{"name": "プリウス", "year": 2015}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "プリウス");
        assert_eq!(json["year"], 2015);

        // Submissions are not stored
        let response = app
            .oneshot(Request::builder().uri("/api/cars").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_json() {
        let app = sqlite_app().await;

        let response = app
            .oneshot(post_json("/api/cars", r#"{"name": "Fit", "year": "#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("Bind: "));
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_types() {
        let app = sqlite_app().await;

        let response = app
            .oneshot(post_json("/api/cars", r#"{"name": "Fit", "year": "2019"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_binds_partial_object() {
        let app = sqlite_app().await;

        let response = app
            .oneshot(post_json("/api/cars", r#"{"name": "Fit"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "Fit");
        assert_eq!(json["year"], 0);
    }

    #[tokio::test]
    async fn test_create_binds_empty_body() {
        let app = sqlite_app().await;

        let response = app.oneshot(post_json("/api/cars", "")).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"id": 3, "name": "", "year": 0})
        );
    }

    #[tokio::test]
    async fn test_webhook_accepts_any_body() {
        let app = sqlite_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from("destination=U123&events=[]"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\"\"");
    }

    #[tokio::test]
    async fn test_webhook_accepts_large_body() {
        let app = sqlite_app().await;
        let body = vec![b'a'; 3 * middleware::MAX_DUMP_BYTES];

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_static_files_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>cars</h1>").unwrap();
        let app = app_with(Arc::new(MemoryStore::new()), dir.path()).await;

        let response = app
            .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>cars</h1>");
    }
}
