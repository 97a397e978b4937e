pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use fog_client::entities::Id;
use fog_client::entities::deployment::Deployment;
use fog_client::entities::history::DeploymentStatusHistory;
use fog_client::entities::replica::DeploymentReplica;
use fog_client::entities::reward::{PendingReward, RewardDistribution};

/// Storage port for everything the control plane persists durably.
///
/// Two implementations: [`mongo::MongoPersistence`] for production and
/// [`memory::InMemoryPersistence`] for local development and tests. Both
/// enforce the same invariants (unique live deployment names per user,
/// append-only status history, exactly-once reward distribution) so
/// swapping one for the other never changes observable behavior.
#[async_trait]
pub trait Persistence: Send + Sync {
  async fn create_deployment(
    &self,
    deployment: Deployment,
  ) -> anyhow::Result<Deployment>;

  async fn get_deployment(
    &self,
    id: Id,
  ) -> anyhow::Result<Option<Deployment>>;

  async fn list_deployments(
    &self,
    user_id: Option<&str>,
    include_deleted: bool,
  ) -> anyhow::Result<Vec<Deployment>>;

  async fn update_deployment(
    &self,
    deployment: Deployment,
  ) -> anyhow::Result<()>;

  async fn soft_delete_deployment(
    &self,
    id: Id,
  ) -> anyhow::Result<()>;

  async fn record_status_history(
    &self,
    entry: DeploymentStatusHistory,
  ) -> anyhow::Result<()>;

  async fn list_status_history(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<DeploymentStatusHistory>>;

  async fn create_replica(
    &self,
    replica: DeploymentReplica,
  ) -> anyhow::Result<DeploymentReplica>;

  async fn update_replica(
    &self,
    replica: DeploymentReplica,
  ) -> anyhow::Result<()>;

  async fn list_replicas(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<DeploymentReplica>>;

  async fn delete_replica(&self, id: Id) -> anyhow::Result<()>;

  async fn queue_pending_reward(
    &self,
    reward: PendingReward,
  ) -> anyhow::Result<()>;

  async fn take_pending_rewards(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<PendingReward>>;

  async fn record_distribution(
    &self,
    distribution: RewardDistribution,
  ) -> anyhow::Result<()>;

  /// Idempotent: creates whatever indexes/constraints the implementation
  /// needs (partial unique index on live deployment names, etc). Called
  /// once at startup.
  async fn ensure_indexes(&self) -> anyhow::Result<()>;
}
