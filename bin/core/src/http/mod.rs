pub mod deployment;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
  Router::new()
    .route(
      "/deployments",
      get(deployment::list).post(deployment::create),
    )
    .route(
      "/deployments/{id}",
      get(deployment::get).delete(deployment::cleanup),
    )
    .route("/deployments/{id}/scale", post(deployment::scale))
    .route(
      "/deployments/{id}/history",
      get(deployment::status_history),
    )
    .route("/healthz", get(healthz))
    .with_state(state)
}

async fn healthz() -> &'static str {
  "ok"
}
