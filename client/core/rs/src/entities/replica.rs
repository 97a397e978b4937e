use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
  Pending,
  Starting,
  Running,
  Stopping,
  Stopped,
  Failed,
}

/// A single scheduled instance of a `Deployment`, placed on one `Node`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReplica {
  #[serde(rename = "_id")]
  pub id: Id,
  pub deployment_id: Id,
  /// `None` until the scheduler places this replica on a node.
  pub node_id: Option<Id>,
  pub status: ReplicaStatus,
  /// Container runtime handle, set once the replica actually starts.
  pub container_id: Option<String>,
  pub started_at: Option<DateTime<Utc>>,
  pub stopped_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
