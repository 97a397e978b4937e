use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  Idle,
  Active,
  Busy,
  Offline,
  Maintenance,
}

/// A fog node capable of hosting deployment replicas. Node membership and
/// telemetry are owned by `fog_core::fleet`; this is just the shape of a
/// snapshot the scheduler scores against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
  #[serde(rename = "_id")]
  pub id: Id,
  pub status: NodeStatus,
  pub cpu_cores: f64,
  pub memory_mb: u32,
  pub storage_gb: u32,
  pub gpu_available: bool,
  pub cpu_usage_percent: f64,
  pub memory_usage_percent: f64,
  pub region: String,
}

impl Node {
  pub fn is_schedulable(&self) -> bool {
    matches!(self.status, NodeStatus::Idle | NodeStatus::Active)
  }
}
