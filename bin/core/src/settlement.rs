use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::Utc;
use fog_client::api::write::CleanupSummary;
use fog_client::entities::Id;
use fog_client::entities::deployment::Deployment;
use fog_client::entities::replica::ReplicaStatus;
use fog_client::entities::reward::{
  DistributionStatus, PendingReward, RewardDistribution, RewardType,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const AUDIT_RING_CAPACITY: usize = 256;

/// Below this, a computed reward is not worth distributing (matches the
/// original reward service's noise floor for staking/runtime accrual).
fn min_reward_threshold() -> Decimal {
  Decimal::new(1, 2) // 0.01
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
  pub reward_id: Id,
  pub account_id: String,
  pub amount: Decimal,
  pub outcome: DistributionStatus,
  pub at: chrono::DateTime<Utc>,
}

/// Fixed-size ring buffer of recent settlement outcomes, kept in memory
/// for `/metrics`-adjacent introspection - not a substitute for the
/// durable `RewardDistribution` records persistence writes.
#[derive(Default)]
pub struct AuditLog {
  entries: RwLock<VecDeque<AuditEntry>>,
}

impl AuditLog {
  pub fn new() -> Self {
    Self::default()
  }

  fn push(&self, entry: AuditEntry) {
    let mut entries = self.entries.write().unwrap();
    if entries.len() == AUDIT_RING_CAPACITY {
      entries.pop_front();
    }
    entries.push_back(entry);
  }

  pub fn recent(&self) -> Vec<AuditEntry> {
    self.entries.read().unwrap().iter().cloned().collect()
  }
}

/// Process-wide settlement counters, exposed the way the core exposes
/// any other metric - atomics updated inline, read on demand.
#[derive(Default)]
pub struct SettlementMetrics {
  pub distributed_total: AtomicU64,
  pub failed_total: AtomicU64,
  pub rolled_back_total: AtomicU64,
}

impl SettlementMetrics {
  pub fn new() -> Self {
    Self::default()
  }
}

/// Computes the staking and runtime rewards `deployment` has accrued
/// since it was last settled, the way the original reward service does
/// at cleanup time: staking reward is `staked * apy * hours/8760` since
/// the account's last reward time, runtime reward is `hours *
/// runtime_reward_rate_per_hour` for every replica that has actually run.
/// Advances the staking clock as a side effect so a later settlement
/// doesn't double-count this span; amounts below [`min_reward_threshold`]
/// are dropped rather than queued.
async fn compute_pending_rewards(
  state: &AppState,
  deployment: &Deployment,
) -> anyhow::Result<Vec<PendingReward>> {
  let now = Utc::now();
  let mut computed = Vec::new();

  let staked = state.tokens.staked_balance(&deployment.user_id).await?;
  if staked > Decimal::ZERO {
    let since = state
      .tokens
      .last_reward_time(&deployment.user_id)
      .await?
      .unwrap_or(deployment.created_at);
    let elapsed_seconds = (now - since).num_seconds().max(0);
    if elapsed_seconds > 0 {
      let hours = Decimal::from(elapsed_seconds) / Decimal::from(3600);
      let apy_fraction = state.config.staking_apy_percent / Decimal::from(100);
      let amount = staked * apy_fraction * hours / Decimal::from(8760);
      if amount >= min_reward_threshold() {
        computed.push(PendingReward {
          reward_id: Uuid::new_v4(),
          account_id: deployment.user_id.clone(),
          amount,
          reason: "staking reward".to_string(),
          deployment_id: Some(deployment.id),
          reward_type: RewardType::Staking,
          metadata: Default::default(),
          created_at: now,
        });
      }
      state.tokens.record_staking_reward(&deployment.user_id, now).await?;
    }
  }

  let replicas = state.persistence.list_replicas(deployment.id).await?;
  for replica in replicas {
    if !matches!(replica.status, ReplicaStatus::Running | ReplicaStatus::Stopping)
    {
      continue;
    }
    let Some(started_at) = replica.started_at else {
      continue;
    };
    let elapsed_seconds = (now - started_at).num_seconds().max(0);
    if elapsed_seconds == 0 {
      continue;
    }
    let hours = Decimal::from(elapsed_seconds) / Decimal::from(3600);
    let amount = hours * state.config.runtime_reward_rate_per_hour;
    if amount < min_reward_threshold() {
      continue;
    }
    computed.push(PendingReward {
      reward_id: Uuid::new_v4(),
      account_id: deployment.user_id.clone(),
      amount,
      reason: format!("runtime reward for replica {}", replica.id),
      deployment_id: Some(deployment.id),
      reward_type: RewardType::Runtime,
      metadata: Default::default(),
      created_at: now,
    });
  }

  Ok(computed)
}

/// Distributes every reward a deployment has accrued (queued plus
/// freshly computed) and only then stops its replicas and soft-deletes
/// it. Distribution is all-or-nothing per call: the first failed
/// transfer stops the loop and every reward already distributed in this
/// call is rolled back in reverse order, so a partial failure never
/// leaves the account holding a mix of paid and unpaid rewards. On
/// failure the deployment and its replicas are left exactly as they
/// were - cleanup never runs unless every reward settles.
pub async fn cleanup_with_distribution(
  state: &AppState,
  deployment_id: Id,
) -> AppResult<CleanupSummary> {
  let deployment =
    crate::controller::get_live_deployment(state, deployment_id).await?;

  let mut pending = state
    .persistence
    .take_pending_rewards(deployment_id)
    .await
    .map_err(AppError::Persistence)?;
  pending.extend(
    compute_pending_rewards(state, &deployment)
      .await
      .map_err(AppError::Internal)?,
  );

  let mut summary = CleanupSummary::default();
  let mut distributed = Vec::new();

  for reward in &pending {
    match distribute_one(state, reward).await {
      Ok(distribution) => {
        summary.rewards_distributed += 1;
        summary.total_distributed += distribution.amount;
        summary.distribution_ids.push(distribution.id);
        state.metrics.distributed_total.fetch_add(1, Ordering::Relaxed);
        state.audit.push(AuditEntry {
          reward_id: reward.reward_id,
          account_id: reward.account_id.clone(),
          amount: reward.amount,
          outcome: DistributionStatus::Distributed,
          at: Utc::now(),
        });
        distributed.push(distribution);
      }
      Err(e) => {
        summary.rewards_failed += 1;
        state.metrics.failed_total.fetch_add(1, Ordering::Relaxed);
        state.audit.push(AuditEntry {
          reward_id: reward.reward_id,
          account_id: reward.account_id.clone(),
          amount: reward.amount,
          outcome: DistributionStatus::Failed,
          at: Utc::now(),
        });
        tracing::warn!(
          reward_id = %reward.reward_id,
          account_id = %reward.account_id,
          error = %e,
          "reward distribution failed, rolling back this settlement",
        );

        for prior in distributed.into_iter().rev() {
          let distribution_id = prior.id;
          let account_id = prior.account_id.clone();
          if let Err(rollback_err) =
            rollback_distribution(state, prior).await
          {
            tracing::error!(
              distribution_id = %distribution_id,
              account_id = %account_id,
              error = %rollback_err,
              "MANUAL INTERVENTION REQUIRED: failed to roll back distribution",
            );
          }
        }

        return Err(AppError::RewardDistributionFailed {
          reward_id: reward.reward_id,
          reason: e.to_string(),
        });
      }
    }
  }

  let replicas = state
    .persistence
    .list_replicas(deployment_id)
    .await
    .map_err(AppError::Persistence)?;
  summary.replicas_stopped = replicas
    .iter()
    .filter(|r| !matches!(r.status, ReplicaStatus::Stopped))
    .count() as u32;

  crate::controller::delete_deployment(state, deployment_id).await?;

  summary.success = true;
  summary.cleanup_completed = true;
  Ok(summary)
}

async fn distribute_one(
  state: &AppState,
  reward: &PendingReward,
) -> anyhow::Result<RewardDistribution> {
  let distribute_result =
    state.tokens.distribute(&reward.account_id, reward.amount).await;

  let (status, transfer_tx_id, error_message, distributed_at) =
    match distribute_result {
      Ok(tx_id) => (
        DistributionStatus::Distributed,
        Some(tx_id),
        None,
        Some(Utc::now()),
      ),
      Err(e) => (DistributionStatus::Failed, None, Some(e.to_string()), None),
    };

  let distribution = RewardDistribution {
    id: Uuid::new_v4(),
    reward_id: reward.reward_id,
    account_id: reward.account_id.clone(),
    amount: reward.amount,
    reward_type: reward.reward_type,
    status,
    created_at: Utc::now(),
    distributed_at,
    rolled_back_at: None,
    transfer_tx_id,
    rollback_tx_id: None,
    error_message,
  };
  state.persistence.record_distribution(distribution.clone()).await?;

  if distribution.status == DistributionStatus::Failed {
    anyhow::bail!(
      distribution
        .error_message
        .clone()
        .unwrap_or_else(|| "distribution failed".to_string())
    );
  }
  Ok(distribution)
}

/// Reverses an already-distributed reward, e.g. because a later audit
/// found it was paid in error. Rolling back a reward that was never
/// distributed, or was already rolled back, is rejected.
pub async fn rollback_distribution(
  state: &AppState,
  mut distribution: RewardDistribution,
) -> AppResult<RewardDistribution> {
  if distribution.status != DistributionStatus::Distributed {
    return Err(AppError::InvalidRequest(format!(
      "distribution {} is not in a rollback-eligible state",
      distribution.id
    )));
  }
  let Some(tx_id) = distribution.transfer_tx_id.clone() else {
    return Err(AppError::InvalidRequest(
      "distribution has no transfer transaction to roll back".to_string(),
    ));
  };
  let rollback_tx_id = state
    .tokens
    .rollback(&tx_id)
    .await
    .map_err(AppError::Internal)?;
  distribution.status = DistributionStatus::RolledBack;
  distribution.rolled_back_at = Some(Utc::now());
  distribution.rollback_tx_id = Some(rollback_tx_id);
  state
    .persistence
    .record_distribution(distribution.clone())
    .await
    .map_err(AppError::Persistence)?;
  state.metrics.rolled_back_total.fetch_add(1, Ordering::Relaxed);
  Ok(distribution)
}
