use axum::Json;
use axum::extract::{Path, Query, State};
use fog_client::api::read::{DeploymentWithDetails, ListDeploymentsQuery};
use fog_client::api::write::{
  CleanupSummary, CreateDeploymentRequest, ScaleDeploymentRequest,
};
use fog_client::entities::Id;
use fog_client::entities::deployment::Deployment;
use fog_client::entities::history::DeploymentStatusHistory;
use serde::Deserialize;

use crate::error::AppResult;
use crate::state::AppState;
use crate::{controller, settlement};

/// The user id a request acts as. A real deployment would derive this
/// from an authenticated session; this control plane takes it as a
/// query parameter since auth is out of scope.
#[derive(Debug, Deserialize)]
pub struct ActingUser {
  pub user_id: String,
}

pub async fn create(
  State(state): State<AppState>,
  Query(acting_user): Query<ActingUser>,
  Json(request): Json<CreateDeploymentRequest>,
) -> AppResult<Json<Deployment>> {
  let deployment =
    controller::create_deployment(&state, &acting_user.user_id, request)
      .await?;
  Ok(Json(deployment))
}

pub async fn get(
  State(state): State<AppState>,
  Path(id): Path<Id>,
) -> AppResult<Json<DeploymentWithDetails>> {
  let deployment = controller::get_live_deployment(&state, id).await?;
  let replicas = state
    .persistence
    .list_replicas(id)
    .await
    .map_err(crate::error::AppError::Persistence)?;
  Ok(Json(DeploymentWithDetails { deployment, replicas }))
}

pub async fn list(
  State(state): State<AppState>,
  Query(query): Query<ListDeploymentsQuery>,
) -> AppResult<Json<Vec<Deployment>>> {
  let deployments = controller::list_deployments(&state, &query).await?;
  Ok(Json(deployments))
}

pub async fn scale(
  State(state): State<AppState>,
  Path(id): Path<Id>,
  Json(request): Json<ScaleDeploymentRequest>,
) -> AppResult<Json<Deployment>> {
  let deployment = controller::scale_deployment(
    &state,
    id,
    request.target_replicas,
  )
  .await?;
  Ok(Json(deployment))
}

/// Tears down a deployment and settles any rewards it accrued.
pub async fn cleanup(
  State(state): State<AppState>,
  Path(id): Path<Id>,
) -> AppResult<Json<CleanupSummary>> {
  let summary =
    settlement::cleanup_with_distribution(&state, id).await?;
  Ok(Json(summary))
}

pub async fn status_history(
  State(state): State<AppState>,
  Path(id): Path<Id>,
) -> AppResult<Json<Vec<DeploymentStatusHistory>>> {
  let history = state
    .persistence
    .list_status_history(id)
    .await
    .map_err(crate::error::AppError::Persistence)?;
  Ok(Json(history))
}
