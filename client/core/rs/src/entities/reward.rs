use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::Id;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
  Staking,
  Runtime,
}

/// A reward owed to an account, queued up for distribution during
/// settlement. `reason` is a free-text audit note, not parsed by anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReward {
  pub reward_id: Id,
  pub account_id: String,
  pub amount: Decimal,
  pub reason: String,
  pub deployment_id: Option<Id>,
  pub reward_type: RewardType,
  #[serde(default)]
  pub metadata: std::collections::BTreeMap<String, String>,
  pub created_at: DateTime<Utc>,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
  Pending,
  Distributed,
  Failed,
  RolledBack,
}

/// Durable record of a reward distribution attempt and its final outcome.
/// `reward_id` is unique: settlement never distributes the same pending
/// reward twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardDistribution {
  #[serde(rename = "_id")]
  pub id: Id,
  pub reward_id: Id,
  pub account_id: String,
  pub amount: Decimal,
  pub reward_type: RewardType,
  pub status: DistributionStatus,
  pub created_at: DateTime<Utc>,
  pub distributed_at: Option<DateTime<Utc>>,
  pub rolled_back_at: Option<DateTime<Utc>>,
  pub transfer_tx_id: Option<String>,
  pub rollback_tx_id: Option<String>,
  pub error_message: Option<String>,
}
