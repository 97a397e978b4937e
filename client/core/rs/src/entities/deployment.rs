use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

/// Lifecycle states of a `Deployment`.
///
/// Transitions are enforced by `fog_core::controller`, not by this type —
/// this is a wire/storage representation only.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
  Pending,
  Scheduled,
  Running,
  Stopped,
  Failed,
  Deleted,
}

/// Resource request for a single replica of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResources {
  pub cpu_cores: f64,
  pub memory_mb: u32,
  pub gpu_units: u32,
  pub storage_gb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
  #[serde(rename = "_id")]
  pub id: Id,
  pub name: String,
  pub user_id: String,
  pub container_image: String,
  pub status: DeploymentStatus,
  pub target_replicas: u32,
  pub resources: DeploymentResources,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Soft-delete marker. `None` means the deployment is live; deleted
  /// deployments are retained for audit/settlement history.
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Deployment {
  pub fn is_deleted(&self) -> bool {
    self.deleted_at.is_some()
  }
}
