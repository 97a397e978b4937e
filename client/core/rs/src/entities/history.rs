use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;
use super::deployment::DeploymentStatus;

/// Append-only record of a deployment status transition. Never mutated or
/// deleted once written, even when the deployment itself is soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatusHistory {
  #[serde(rename = "_id")]
  pub id: Id,
  pub deployment_id: Id,
  pub old_status: DeploymentStatus,
  pub new_status: DeploymentStatus,
  /// `None` for transitions driven by the system (e.g. scheduler, health
  /// monitor) rather than an explicit user action.
  pub changed_by: Option<Id>,
  pub changed_at: DateTime<Utc>,
  pub reason: Option<String>,
}
