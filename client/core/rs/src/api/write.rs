use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::Id;
use crate::entities::deployment::DeploymentResources;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeploymentRequest {
  pub name: String,
  pub container_image: String,
  pub target_replicas: u32,
  pub resources: DeploymentResources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScaleDeploymentRequest {
  pub target_replicas: u32,
}

/// Returned by the cleanup/settlement endpoint: how many replicas were
/// torn down and what was (or wasn't) paid out for them. Mirrors the
/// `CleanupResult{success, cleanup_completed, rollback_occurred, error}`
/// contract, with the core's own per-reward counters alongside it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
  pub success: bool,
  pub cleanup_completed: bool,
  pub rollback_occurred: bool,
  pub error: Option<String>,
  pub replicas_stopped: u32,
  pub rewards_distributed: u32,
  pub rewards_failed: u32,
  pub total_distributed: Decimal,
  pub distribution_ids: Vec<Id>,
}
