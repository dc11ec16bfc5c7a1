use axum::Router;
use db::DBService;
use services::services::rag_sync::RagSyncService;

pub mod config;
pub mod error;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub sync: RagSyncService,
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::schedules::router())
        .merge(routes::activities::router())
        .merge(routes::rag::router());
    Router::new().nest("/api", api).with_state(state)
}
