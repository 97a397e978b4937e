use chrono::Utc;
use fog_client::api::read::ListDeploymentsQuery;
use fog_client::api::write::CreateDeploymentRequest;
use fog_client::entities::Id;
use fog_client::entities::deployment::{Deployment, DeploymentStatus};
use fog_client::entities::history::DeploymentStatusHistory;
use fog_client::entities::replica::{DeploymentReplica, ReplicaStatus};
use uuid::Uuid;
use validations::StringValidator;

use crate::error::{AppError, AppResult};
use crate::hooks::DeploymentEvent;
use crate::persistence::Persistence;
use crate::scheduler::queue::{PlacementJob, SubmitError};
use crate::state::AppState;

fn submit_placement(state: &AppState, job: PlacementJob) -> AppResult<()> {
  state.placement_queue.submit(job).map_err(|e| {
    let message = e.to_string();
    match e {
      SubmitError::QueueFull => AppError::QueueFull,
      SubmitError::WorkerShutDown => {
        AppError::Internal(anyhow::anyhow!(message))
      }
    }
  })
}

fn name_validator() -> StringValidator {
  StringValidator::default().min_length(1).max_length(Some(128))
}

/// Allowed `Deployment` status transitions. Anything not listed here is
/// rejected with [`AppError::IllegalTransition`].
fn transition_allowed(
  from: DeploymentStatus,
  to: DeploymentStatus,
) -> bool {
  use DeploymentStatus::*;
  matches!(
    (from, to),
    (Pending, Scheduled)
      | (Pending, Failed)
      | (Scheduled, Running)
      | (Scheduled, Failed)
      | (Running, Stopped)
      | (Running, Failed)
      | (Running, Scheduled)
      | (Stopped, Scheduled)
      | (Stopped, Deleted)
      | (Failed, Scheduled)
      | (Failed, Deleted)
      | (Pending, Deleted)
  )
}

async fn transition_status(
  persistence: &dyn Persistence,
  deployment: &mut Deployment,
  to: DeploymentStatus,
  changed_by: Option<Id>,
  reason: Option<String>,
) -> AppResult<()> {
  if deployment.status == to {
    return Ok(());
  }
  if !transition_allowed(deployment.status, to) {
    return Err(AppError::IllegalTransition {
      from: deployment.status.to_string(),
      to: to.to_string(),
    });
  }
  let from = deployment.status;
  deployment.status = to;
  deployment.updated_at = Utc::now();
  persistence
    .update_deployment(deployment.clone())
    .await
    .map_err(AppError::Persistence)?;
  persistence
    .record_status_history(DeploymentStatusHistory {
      id: Uuid::new_v4(),
      deployment_id: deployment.id,
      old_status: from,
      new_status: to,
      changed_by,
      changed_at: Utc::now(),
      reason,
    })
    .await
    .map_err(AppError::Persistence)?;
  Ok(())
}

/// Creates a deployment, its replica rows, and queues one placement job
/// per replica. The deployment starts `Pending`, moving to `Scheduled`
/// only once the scheduler has placed at least one replica (see the
/// "at least one replica RUNNING" semantics for readiness).
pub async fn create_deployment(
  state: &AppState,
  user_id: &str,
  request: CreateDeploymentRequest,
) -> AppResult<Deployment> {
  name_validator()
    .validate(&request.name)
    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
  if request.target_replicas == 0 {
    return Err(AppError::InvalidRequest(
      "target_replicas must be at least 1".to_string(),
    ));
  }

  let now = Utc::now();
  let deployment = Deployment {
    id: Uuid::new_v4(),
    name: request.name,
    user_id: user_id.to_string(),
    container_image: request.container_image,
    status: DeploymentStatus::Pending,
    target_replicas: request.target_replicas,
    resources: request.resources,
    created_at: now,
    updated_at: now,
    deleted_at: None,
  };

  let name = deployment.name.clone();
  let deployment = state
    .persistence
    .create_deployment(deployment)
    .await
    .map_err(|e| {
      if e.to_string().contains("already in use")
        || e.to_string().contains("already exists")
      {
        AppError::DuplicateDeploymentName(name)
      } else {
        AppError::Persistence(e)
      }
    })?;

  for _ in 0..deployment.target_replicas {
    let replica = DeploymentReplica {
      id: Uuid::new_v4(),
      deployment_id: deployment.id,
      node_id: None,
      status: ReplicaStatus::Pending,
      container_id: None,
      started_at: None,
      stopped_at: None,
      created_at: now,
      updated_at: now,
    };
    let replica = state
      .persistence
      .create_replica(replica)
      .await
      .map_err(AppError::Persistence)?;
    submit_placement(
      state,
      PlacementJob { deployment_id: deployment.id, replica_id: replica.id },
    )?;
  }

  state.hooks.fire(DeploymentEvent::Created(deployment.id));
  Ok(deployment)
}

pub async fn scale_deployment(
  state: &AppState,
  id: Id,
  target_replicas: u32,
) -> AppResult<Deployment> {
  if target_replicas == 0 {
    return Err(AppError::InvalidRequest(
      "target_replicas must be at least 1".to_string(),
    ));
  }
  let mut deployment = get_live_deployment(state, id).await?;
  let current = state
    .persistence
    .list_replicas(id)
    .await
    .map_err(AppError::Persistence)?;

  if target_replicas as usize > current.len() {
    let now = Utc::now();
    for _ in current.len()..target_replicas as usize {
      let replica = DeploymentReplica {
        id: Uuid::new_v4(),
        deployment_id: id,
        node_id: None,
        status: ReplicaStatus::Pending,
        container_id: None,
        started_at: None,
        stopped_at: None,
        created_at: now,
        updated_at: now,
      };
      let replica = state
        .persistence
        .create_replica(replica)
        .await
        .map_err(AppError::Persistence)?;
      submit_placement(
        state,
        PlacementJob { deployment_id: id, replica_id: replica.id },
      )?;
    }
  } else {
    let mut to_remove = current.len() - target_replicas as usize;
    for replica in current {
      if to_remove == 0 {
        break;
      }
      if replica.status == ReplicaStatus::Stopping
        || replica.status == ReplicaStatus::Stopped
      {
        continue;
      }
      stop_replica(state, replica).await?;
      to_remove -= 1;
    }
  }

  deployment.target_replicas = target_replicas;
  deployment.updated_at = Utc::now();
  state
    .persistence
    .update_deployment(deployment.clone())
    .await
    .map_err(AppError::Persistence)?;
  Ok(deployment)
}

async fn stop_replica(
  state: &AppState,
  mut replica: DeploymentReplica,
) -> AppResult<()> {
  replica.status = ReplicaStatus::Stopping;
  replica.updated_at = Utc::now();
  state
    .persistence
    .update_replica(replica.clone())
    .await
    .map_err(AppError::Persistence)?;

  if let Some(handle) = replica.container_id.clone() {
    state
      .runtime
      .stop(&handle)
      .await
      .map_err(AppError::Runtime)?;
  }
  if let Some(node_id) = replica.node_id {
    let _ = state
      .nodes
      .record_release(
        node_id,
        // Best-effort: release telemetry is advisory, not authoritative.
        0.0,
        0,
      )
      .await;
  }
  replica.status = ReplicaStatus::Stopped;
  replica.stopped_at = Some(Utc::now());
  replica.updated_at = Utc::now();
  state
    .persistence
    .update_replica(replica)
    .await
    .map_err(AppError::Persistence)?;
  Ok(())
}

/// Soft-deletes a deployment, stopping every non-terminal replica first.
/// Settlement (reward distribution for accrued runtime) is a separate
/// step - see [`crate::settlement::cleanup_with_distribution`].
pub async fn delete_deployment(
  state: &AppState,
  id: Id,
) -> AppResult<()> {
  let deployment = get_live_deployment(state, id).await?;
  let replicas = state
    .persistence
    .list_replicas(id)
    .await
    .map_err(AppError::Persistence)?;
  for replica in replicas {
    if !matches!(
      replica.status,
      ReplicaStatus::Stopped | ReplicaStatus::Stopping
    ) {
      stop_replica(state, replica).await?;
    }
  }
  let mut deployment = deployment;
  let _ = transition_status(
    state.persistence.as_ref(),
    &mut deployment,
    DeploymentStatus::Stopped,
    None,
    Some("deleted".to_string()),
  )
  .await;
  state
    .persistence
    .soft_delete_deployment(id)
    .await
    .map_err(AppError::Persistence)?;
  state.hooks.fire(DeploymentEvent::Deleted(id));
  Ok(())
}

pub async fn get_live_deployment(
  state: &AppState,
  id: Id,
) -> AppResult<Deployment> {
  state
    .persistence
    .get_deployment(id)
    .await
    .map_err(AppError::Persistence)?
    .filter(|d| !d.is_deleted())
    .ok_or(AppError::DeploymentNotFound(id))
}

pub async fn list_deployments(
  state: &AppState,
  query: &ListDeploymentsQuery,
) -> AppResult<Vec<Deployment>> {
  state
    .persistence
    .list_deployments(query.user_id.as_deref(), query.include_deleted)
    .await
    .map_err(AppError::Persistence)
}

/// Marks a replica running once the scheduler has actually started its
/// container, and promotes the owning deployment out of `Pending`/
/// `Scheduled` the moment at least one replica is `Running` - the
/// readiness semantics this system uses in place of "every replica
/// must be up".
pub async fn mark_replica_running(
  persistence: &dyn Persistence,
  mut replica: DeploymentReplica,
  container_id: String,
) -> AppResult<()> {
  replica.status = ReplicaStatus::Running;
  replica.container_id = Some(container_id);
  replica.started_at = Some(Utc::now());
  replica.updated_at = Utc::now();
  persistence
    .update_replica(replica.clone())
    .await
    .map_err(AppError::Persistence)?;

  let mut deployment = persistence
    .get_deployment(replica.deployment_id)
    .await
    .map_err(AppError::Persistence)?
    .ok_or(AppError::DeploymentNotFound(replica.deployment_id))?;
  if deployment.status == DeploymentStatus::Pending {
    transition_status(
      persistence,
      &mut deployment,
      DeploymentStatus::Scheduled,
      None,
      None,
    )
    .await?;
  }
  if deployment.status == DeploymentStatus::Scheduled {
    transition_status(
      persistence,
      &mut deployment,
      DeploymentStatus::Running,
      None,
      None,
    )
    .await?;
  }
  Ok(())
}

/// Marks a replica `Failed` because the scheduler found no schedulable
/// node with capacity for it. If the owning deployment hasn't already
/// gotten at least one replica running, it auto-transitions to `Failed`
/// too; a deployment with other healthy replicas is left alone.
pub async fn mark_replica_failed(
  persistence: &dyn Persistence,
  mut replica: DeploymentReplica,
  reason: Option<String>,
) -> AppResult<()> {
  replica.status = ReplicaStatus::Failed;
  replica.updated_at = Utc::now();
  persistence
    .update_replica(replica.clone())
    .await
    .map_err(AppError::Persistence)?;

  let mut deployment = persistence
    .get_deployment(replica.deployment_id)
    .await
    .map_err(AppError::Persistence)?
    .ok_or(AppError::DeploymentNotFound(replica.deployment_id))?;
  if matches!(
    deployment.status,
    DeploymentStatus::Pending | DeploymentStatus::Scheduled
  ) {
    transition_status(
      persistence,
      &mut deployment,
      DeploymentStatus::Failed,
      None,
      reason,
    )
    .await?;
  }
  Ok(())
}
