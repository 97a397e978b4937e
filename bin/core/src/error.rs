use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Every failure mode the control plane can surface over HTTP, mapped to
/// a status code at the edge so handlers can stay in terms of domain
/// errors instead of HTTP concerns.
#[derive(Debug, Error)]
pub enum AppError {
  #[error("deployment {0} not found")]
  DeploymentNotFound(uuid::Uuid),

  #[error("node {0} not found")]
  NodeNotFound(uuid::Uuid),

  #[error("a deployment named '{0}' already exists for this user")]
  DuplicateDeploymentName(String),

  #[error("placement queue is full, try again later")]
  QueueFull,

  #[error("reward distribution failed for reward {reward_id}: {reason}")]
  RewardDistributionFailed { reward_id: uuid::Uuid, reason: String },

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("illegal status transition: {from} -> {to}")]
  IllegalTransition { from: String, to: String },

  #[error("container runtime error: {0}")]
  Runtime(#[source] anyhow::Error),

  #[error("persistence error: {0}")]
  Persistence(#[source] anyhow::Error),

  #[error("internal error: {0}")]
  Internal(#[source] anyhow::Error),
}

impl AppError {
  fn status(&self) -> StatusCode {
    match self {
      AppError::DeploymentNotFound(_) | AppError::NodeNotFound(_) => {
        StatusCode::NOT_FOUND
      }
      AppError::DuplicateDeploymentName(_)
      | AppError::RewardDistributionFailed { .. } => StatusCode::CONFLICT,
      AppError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
      AppError::InvalidRequest(_) | AppError::IllegalTransition { .. } => {
        StatusCode::BAD_REQUEST
      }
      AppError::Runtime(_)
      | AppError::Persistence(_)
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status == StatusCode::INTERNAL_SERVER_ERROR {
      tracing::error!("{self:#}");
    }
    (status, Json(json!({ "error": self.to_string() })))
      .into_response()
  }
}

pub type AppResult<T> = Result<T, AppError>;
