//! imcite Server - Crossref Metadata Fetcher
//!
//! HTTP surface for the imcite pipeline: a small web form plus JSON
//! endpoints for starting fetch runs, polling their progress, and
//! downloading the resulting table.

pub mod http;
pub mod run;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use imcite_core::sources::crossref::CrossrefSource;

use run::{Run, Session};

/// Shared application state
pub struct AppState {
    pub source: CrossrefSource,
    pub sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    pub runs: RwLock<HashMap<Uuid, Arc<Run>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_source(CrossrefSource::new())
    }

    /// Create with a preconfigured source, e.g. one carrying a polite
    /// pool contact address.
    pub fn with_source(source: CrossrefSource) -> Self {
        Self {
            source,
            sessions: RwLock::new(HashMap::new()),
            runs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_session(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        tracing::info!("Session {} created", session.id);
        session
    }

    pub async fn session(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn run(&self, id: Uuid) -> Option<Arc<Run>> {
        self.runs.read().await.get(&id).cloned()
    }

    pub async fn register_run(&self, run: Arc<Run>) {
        self.runs.write().await.insert(run.id, run);
    }

    /// Drop a session along with its cache and runs.
    pub async fn remove_session(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.write().await.remove(&id)?;
        let run_ids: Vec<Uuid> = session.runs.read().await.keys().copied().collect();
        let mut runs = self.runs.write().await;
        for run_id in run_ids {
            runs.remove(&run_id);
        }
        tracing::info!("Session {} removed", id);
        Some(session)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Web form
        .route("/", get(http::index))
        // Run endpoints
        .route("/runs", post(http::create_run))
        .route("/runs/{id}", get(http::get_run))
        .route("/runs/{id}/metadata.csv", get(http::download_csv))
        .route("/runs/{id}/metadata.xlsx", get(http::download_xlsx))
        // Session endpoints
        .route("/sessions/{id}", delete(http::delete_session))
        // System endpoints
        .route("/status", get(http::get_status))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("imcite server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
