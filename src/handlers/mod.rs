// handlers/mod.rs - HTTP surface over the vault service
//
// /health                 store connectivity
// /api/data/:schema       list (cursor page) and create
// /api/data/:schema/:id   show (raw + decrypted) and update

pub mod data;
pub mod health;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::VaultService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VaultService>,
    pub max_page_size: usize,
    pub request_logging: bool,
}

impl AppState {
    pub fn new(service: Arc<VaultService>, max_page_size: usize) -> Self {
        Self {
            service,
            max_page_size: max_page_size.max(1),
            request_logging: true,
        }
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health))
        .merge(data_routes())
        .layer(CorsLayer::permissive());

    if state.request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn data_routes() -> Router<AppState> {
    Router::new()
        // Schema-level operations (collection)
        .route("/api/data/:schema", get(data::schema_get).post(data::schema_post))
        // Record-level operations (individual)
        .route("/api/data/:schema/:id", get(data::record_get).put(data::record_put))
}
