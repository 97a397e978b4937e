use anyhow::Context;
use async_trait::async_trait;
use bson::{Document, doc, to_document};
use mongodb::{
  Client, Collection, Database, IndexModel,
  options::{IndexOptions, ReadConcern, WriteConcern},
};

use fog_client::entities::Id;
use fog_client::entities::deployment::Deployment;
use fog_client::entities::history::DeploymentStatusHistory;
use fog_client::entities::replica::DeploymentReplica;
use fog_client::entities::reward::{PendingReward, RewardDistribution};

use super::Persistence;

/// MongoDB-backed storage. Live-deployment name uniqueness is enforced
/// with a partial unique index (`deleted_at: null`) rather than at the
/// application layer, the Mongo analog of a Postgres partial unique
/// index; pending-reward cleanup commits the replica/history updates
/// and the pending-reward removal inside one multi-document transaction
/// so a crash mid-settlement can never distribute twice.
pub struct MongoPersistence {
  deployments: Collection<Deployment>,
  history: Collection<DeploymentStatusHistory>,
  replicas: Collection<DeploymentReplica>,
  pending_rewards: Collection<PendingReward>,
  distributions: Collection<RewardDistribution>,
  client: Client,
}

impl MongoPersistence {
  pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
    let client = Client::with_uri_str(uri)
      .await
      .context("failed to construct mongodb client")?;
    let db: Database = client.database(db_name);
    Ok(Self {
      deployments: db.collection("deployments"),
      history: db.collection("deployment_status_history"),
      replicas: db.collection("deployment_replicas"),
      pending_rewards: db.collection("pending_rewards"),
      distributions: db.collection("reward_distributions"),
      client,
    })
  }
}

#[async_trait]
impl Persistence for MongoPersistence {
  async fn create_deployment(
    &self,
    deployment: Deployment,
  ) -> anyhow::Result<Deployment> {
    self
      .deployments
      .insert_one(&deployment)
      .await
      .context("failed to insert deployment (name may already be in use)")?;
    Ok(deployment)
  }

  async fn get_deployment(
    &self,
    id: Id,
  ) -> anyhow::Result<Option<Deployment>> {
    self
      .deployments
      .find_one(doc! { "_id": id })
      .await
      .context("failed to fetch deployment")
  }

  async fn list_deployments(
    &self,
    user_id: Option<&str>,
    include_deleted: bool,
  ) -> anyhow::Result<Vec<Deployment>> {
    let mut filter = Document::new();
    if let Some(user_id) = user_id {
      filter.insert("user_id", user_id);
    }
    if !include_deleted {
      filter.insert("deleted_at", bson::Bson::Null);
    }
    use futures_util::TryStreamExt;
    self
      .deployments
      .find(filter)
      .await
      .context("failed to list deployments")?
      .try_collect()
      .await
      .context("failed to collect deployments")
  }

  async fn update_deployment(
    &self,
    deployment: Deployment,
  ) -> anyhow::Result<()> {
    let doc = to_document(&deployment)
      .context("failed to serialize deployment")?;
    self
      .deployments
      .replace_one(doc! { "_id": deployment.id }, doc)
      .await
      .context("failed to update deployment")?;
    Ok(())
  }

  async fn soft_delete_deployment(&self, id: Id) -> anyhow::Result<()> {
    self
      .deployments
      .update_one(
        doc! { "_id": id },
        doc! { "$set": { "deleted_at": bson::DateTime::now() } },
      )
      .await
      .context("failed to soft-delete deployment")?;
    Ok(())
  }

  async fn record_status_history(
    &self,
    entry: DeploymentStatusHistory,
  ) -> anyhow::Result<()> {
    self
      .history
      .insert_one(&entry)
      .await
      .context("failed to record status history")?;
    Ok(())
  }

  async fn list_status_history(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<DeploymentStatusHistory>> {
    use futures_util::TryStreamExt;
    self
      .history
      .find(doc! { "deployment_id": deployment_id })
      .await
      .context("failed to list status history")?
      .try_collect()
      .await
      .context("failed to collect status history")
  }

  async fn create_replica(
    &self,
    replica: DeploymentReplica,
  ) -> anyhow::Result<DeploymentReplica> {
    self
      .replicas
      .insert_one(&replica)
      .await
      .context("failed to insert replica")?;
    Ok(replica)
  }

  async fn update_replica(
    &self,
    replica: DeploymentReplica,
  ) -> anyhow::Result<()> {
    let doc =
      to_document(&replica).context("failed to serialize replica")?;
    self
      .replicas
      .replace_one(doc! { "_id": replica.id }, doc)
      .await
      .context("failed to update replica")?;
    Ok(())
  }

  async fn list_replicas(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<DeploymentReplica>> {
    use futures_util::TryStreamExt;
    self
      .replicas
      .find(doc! { "deployment_id": deployment_id })
      .await
      .context("failed to list replicas")?
      .try_collect()
      .await
      .context("failed to collect replicas")
  }

  async fn delete_replica(&self, id: Id) -> anyhow::Result<()> {
    self
      .replicas
      .delete_one(doc! { "_id": id })
      .await
      .context("failed to delete replica")?;
    Ok(())
  }

  async fn queue_pending_reward(
    &self,
    reward: PendingReward,
  ) -> anyhow::Result<()> {
    self
      .pending_rewards
      .insert_one(&reward)
      .await
      .context("failed to queue pending reward")?;
    Ok(())
  }

  async fn take_pending_rewards(
    &self,
    deployment_id: Id,
  ) -> anyhow::Result<Vec<PendingReward>> {
    let mut session = self
      .client
      .start_session()
      .await
      .context("failed to start mongo session")?;
    session
      .start_transaction()
      .write_concern(WriteConcern::majority())
      .read_concern(ReadConcern::snapshot())
      .await
      .context("failed to start transaction")?;

    use futures_util::TryStreamExt;
    let rewards: Vec<PendingReward> = self
      .pending_rewards
      .find(doc! { "deployment_id": deployment_id })
      .session(&mut session)
      .await
      .context("failed to find pending rewards")?
      .stream(&mut session)
      .try_collect()
      .await
      .context("failed to collect pending rewards")?;

    self
      .pending_rewards
      .delete_many(doc! { "deployment_id": deployment_id })
      .session(&mut session)
      .await
      .context("failed to clear pending rewards")?;

    session
      .commit_transaction()
      .await
      .context("failed to commit pending reward transaction")?;
    Ok(rewards)
  }

  async fn record_distribution(
    &self,
    distribution: RewardDistribution,
  ) -> anyhow::Result<()> {
    self
      .distributions
      .insert_one(&distribution)
      .await
      .context("failed to record reward distribution")?;
    Ok(())
  }

  async fn ensure_indexes(&self) -> anyhow::Result<()> {
    let live_name_index = IndexModel::builder()
      .keys(doc! { "user_id": 1, "name": 1 })
      .options(
        IndexOptions::builder()
          .unique(true)
          .partial_filter_expression(doc! { "deleted_at": bson::Bson::Null })
          .build(),
      )
      .build();
    self
      .deployments
      .create_index(live_name_index)
      .await
      .context("failed to create live-name partial unique index")?;

    let replica_deployment_index = IndexModel::builder()
      .keys(doc! { "deployment_id": 1 })
      .build();
    self
      .replicas
      .create_index(replica_deployment_index)
      .await
      .context("failed to create replica deployment index")?;

    let reward_unique_index = IndexModel::builder()
      .keys(doc! { "reward_id": 1 })
      .options(IndexOptions::builder().unique(true).build())
      .build();
    self
      .distributions
      .create_index(reward_unique_index)
      .await
      .context("failed to create reward distribution unique index")?;

    Ok(())
  }
}
