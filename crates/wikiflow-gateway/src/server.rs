//! HTTP server implementation using Axum.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use wikiflow_core::WikiflowConfig;
use wikiflow_workflows::{SqliteStore, WorkflowEngine, transport_from_config};

use crate::error::ApiError;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    /// Same store the engine uses, for the admin endpoints.
    pub store: Arc<SqliteStore>,
    /// Trusted service credential. `None` trusts every caller.
    pub service_key: Option<String>,
    pub start_time: std::time::Instant,
}

/// Service credential middleware: `Authorization: Bearer <key>` or `apikey: <key>`.
async fn require_service_key(
    State(state): State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // If no key configured, allow all
    let Some(expected) = &state.service_key else {
        return next.run(req).await;
    };

    if presented_key(req.headers()).is_some_and(|k| k == expected.as_str()) {
        return next.run(req).await;
    }

    tracing::warn!("🔒 Rejected {} {}: missing or invalid service key", req.method(), req.uri().path());
    ApiError::Unauthorized("invalid or missing service key".into()).into_response()
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    bearer.or_else(|| headers.get("apikey").and_then(|v| v.to_str().ok()))
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    // Protected routes: require the service key
    let protected = Router::new()
        .route("/trigger-workflow", post(super::routes::trigger_workflow))
        .route("/send-notification", post(super::routes::send_notification))
        // Workflow definitions
        .route(
            "/workflows",
            get(super::routes::list_workflows).post(super::routes::save_workflow),
        )
        .route(
            "/workflows/{id}",
            get(super::routes::get_workflow).delete(super::routes::delete_workflow),
        )
        // Tasks
        .route("/tasks", get(super::routes::list_tasks))
        .route("/tasks/{id}/status", post(super::routes::update_task_status))
        // Notification inbox
        .route("/notifications", get(super::routes::list_notifications))
        .route("/notifications/{id}/read", post(super::routes::mark_notification_read))
        .route("/notifications/{id}", delete(super::routes::delete_notification))
        // Preferences & directory
        .route(
            "/preferences",
            get(super::routes::list_preferences).put(super::routes::set_preference),
        )
        .route("/users/{id}", put(super::routes::upsert_user))
        .route_layer(axum::middleware::from_fn_with_state(
            shared.clone(),
            require_service_key,
        ));

    // Public routes: no auth
    let public = Router::new().route("/health", get(super::routes::health_check));

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any)
        .max_age(std::time::Duration::from_secs(3600));

    protected
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Open the store, wire the engine, and serve until shutdown.
pub async fn start(config: &WikiflowConfig) -> anyhow::Result<()> {
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(SqliteStore::open(db_path)?);
    tracing::info!("💾 Database initialized: {}", db_path.display());

    let mailer = transport_from_config(config)?;
    let engine = WorkflowEngine::new(store.clone(), mailer, &config.notifications);

    if config.gateway.service_key.is_none() {
        tracing::warn!("⚠️ No service key configured, all callers are trusted");
    }

    let state = AppState {
        engine: Arc::new(engine),
        store,
        service_key: config.gateway.service_key.clone(),
        start_time: std::time::Instant::now(),
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
