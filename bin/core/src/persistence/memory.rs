use std::collections::HashMap;

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::RwLock;

use fog_client::entities::Id;
use fog_client::entities::deployment::Deployment;
use fog_client::entities::history::DeploymentStatusHistory;
use fog_client::entities::replica::DeploymentReplica;
use fog_client::entities::reward::{PendingReward, RewardDistribution};

use super::Persistence;

/// Plain in-memory backing store. Used for local development (no Mongo
/// required) and the integration test suite; enforces the same unique
/// live-name and append-only-history invariants as the Mongo backend,
/// just with a mutex instead of a partial index.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
  deployments: RwLock<HashMap<Id, Deployment>>,
  history: RwLock<Vec<DeploymentStatusHistory>>,
  replicas: RwLock<HashMap<Id, DeploymentReplica>>,
  pending_rewards: RwLock<HashMap<Id, Vec<PendingReward>>>,
  distributions: RwLock<Vec<RewardDistribution>>,
}

impl InMemoryPersistence {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
  async fn create_deployment(
    &self,
    deployment: Deployment,
  ) -> anyhow::Result<Deployment> {
    let mut deployments = self.deployments.write().await;
    let name_taken = deployments.values().any(|d| {
      d.deleted_at.is_none()
        && d.user_id == deployment.user_id
        && d.name == deployment.name
    });
    if name_taken {
      bail!(
        "a live deployment named '{}' already exists for this user",
        deployment.name
      );
    }
    deployments.insert(deployment.id, deployment.clone());
    Ok(deployment)
  }

  async fn get_deployment(
    &self,
    id: Id,
  ) -> anyhow::Result<Option<Deployment>> {
    Ok(self.deployments.read().await.get(&id).cloned())
  }

  async fn list_deployments(
    &self,
    user_id: Option<&str>,
    include_deleted: bool,
  ) -> anyhow::Result<Vec<Deployment>> {
    Ok(
      self
        .deployments
        .read()
        .await
        .values()
        .filter(|d| include_deleted || d.deleted_at.is_none())
        .filter(|d| user_id.is_none_or(|uid| d.user_id == uid))
        .cloned()
        .collect(),
    )
  }

  async fn update_deployment(
    &self,
    deployment: Deployment,
  ) -> anyhow::Result<()> {
    self
      .deployments
      .write()
      .await
      .insert(deployment.id, deployment);
    Ok(())
  }

  async fn soft_delete_deployment(&self, id: Id) -> anyhow::Result<()> {
    if let Some(d) = self.deployments.write().await.get_mut(&id) {
      d.deleted_at = Some(chrono::Utc::now());
    }
    Ok(())
  }

  async fn record_status_history(
    &self,
    entry: DeploymentStatusHistory,
  ) -> anyhow::Result<()> {
    self.history.write().await.push(entry);
    Ok(())
  }

  async fn list_status_history(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<DeploymentStatusHistory>> {
    Ok(
      self
        .history
        .read()
        .await
        .iter()
        .filter(|h| h.deployment_id == deployment_id)
        .cloned()
        .collect(),
    )
  }

  async fn create_replica(
    &self,
    replica: DeploymentReplica,
  ) -> anyhow::Result<DeploymentReplica> {
    self
      .replicas
      .write()
      .await
      .insert(replica.id, replica.clone());
    Ok(replica)
  }

  async fn update_replica(
    &self,
    replica: DeploymentReplica,
  ) -> anyhow::Result<()> {
    self.replicas.write().await.insert(replica.id, replica);
    Ok(())
  }

  async fn list_replicas(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<DeploymentReplica>> {
    Ok(
      self
        .replicas
        .read()
        .await
        .values()
        .filter(|r| r.deployment_id == deployment_id)
        .cloned()
        .collect(),
    )
  }

  async fn delete_replica(&self, id: Id) -> anyhow::Result<()> {
    self.replicas.write().await.remove(&id);
    Ok(())
  }

  async fn queue_pending_reward(
    &self,
    reward: PendingReward,
  ) -> anyhow::Result<()> {
    let Some(deployment_id) = reward.deployment_id else {
      bail!("pending reward must be associated with a deployment");
    };
    self
      .pending_rewards
      .write()
      .await
      .entry(deployment_id)
      .or_default()
      .push(reward);
    Ok(())
  }

  async fn take_pending_rewards(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<PendingReward>> {
    Ok(
      self
        .pending_rewards
        .write()
        .await
        .remove(&deployment_id)
        .unwrap_or_default(),
    )
  }

  async fn record_distribution(
    &self,
    distribution: RewardDistribution,
  ) -> anyhow::Result<()> {
    self.distributions.write().await.push(distribution);
    Ok(())
  }

  async fn ensure_indexes(&self) -> anyhow::Result<()> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use fog_client::entities::deployment::{
    DeploymentResources, DeploymentStatus,
  };
  use uuid::Uuid;

  fn sample(name: &str, user_id: &str) -> Deployment {
    Deployment {
      id: Uuid::new_v4(),
      name: name.to_string(),
      user_id: user_id.to_string(),
      container_image: "alpine:latest".to_string(),
      status: DeploymentStatus::Pending,
      target_replicas: 1,
      resources: DeploymentResources {
        cpu_cores: 1.0,
        memory_mb: 512,
        gpu_units: 0,
        storage_gb: 1,
      },
      created_at: chrono::Utc::now(),
      updated_at: chrono::Utc::now(),
      deleted_at: None,
    }
  }

  #[tokio::test]
  async fn duplicate_live_name_is_rejected() {
    let store = InMemoryPersistence::new();
    store.create_deployment(sample("web", "alice")).await.unwrap();
    assert!(
      store.create_deployment(sample("web", "alice")).await.is_err()
    );
  }

  #[tokio::test]
  async fn name_can_be_reused_after_soft_delete() {
    let store = InMemoryPersistence::new();
    let first = store.create_deployment(sample("web", "alice")).await.unwrap();
    store.soft_delete_deployment(first.id).await.unwrap();
    assert!(
      store.create_deployment(sample("web", "alice")).await.is_ok()
    );
  }

  #[tokio::test]
  async fn deleted_deployments_excluded_by_default() {
    let store = InMemoryPersistence::new();
    let d = store.create_deployment(sample("web", "alice")).await.unwrap();
    store.soft_delete_deployment(d.id).await.unwrap();
    let listed = store.list_deployments(Some("alice"), false).await.unwrap();
    assert!(listed.is_empty());
    let listed_all =
      store.list_deployments(Some("alice"), true).await.unwrap();
    assert_eq!(listed_all.len(), 1);
  }
}
