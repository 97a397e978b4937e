use std::sync::Arc;

use fog_client::api::write::CreateDeploymentRequest;
use fog_client::entities::deployment::{DeploymentResources, DeploymentStatus};
use fog_client::entities::node::{Node, NodeStatus};
use fog_client::entities::reward::{PendingReward, RewardType};
use fog_client::entities::replica::ReplicaStatus;
use rust_decimal::Decimal;
use uuid::Uuid;

use fog_core::config::AppConfig;
use fog_core::controller;
use fog_core::fleet::InMemoryNodeDirectory;
use fog_core::hooks::Hooks;
use fog_core::persistence::Persistence;
use fog_core::persistence::memory::InMemoryPersistence;
use fog_core::ports::NodeDirectory;
use fog_core::runtime::mock::MockContainerRuntime;
use fog_core::scheduler::{self, queue::spawn_worker};
use fog_core::settlement::{self, AuditLog, SettlementMetrics};
use fog_core::state::AppState;
use fog_core::tokens::ledger::LedgerTokenSystem;
use tokio_util::sync::CancellationToken;

fn test_config() -> AppConfig {
  AppConfig {
    bind_address: "127.0.0.1:0".to_string(),
    database_uri: None,
    database_db_name: "fog_core_test".to_string(),
    docker_enabled: false,
    mock_fallback_on_runtime_error: true,
    staking_apy_percent: Decimal::new(8, 0),
    runtime_reward_rate_per_hour: Decimal::new(5, 2),
    cors_allowed_origins: Vec::new(),
    log: logger::LogConfig::default(),
  }
}

fn sample_node(region: &str) -> Node {
  Node {
    id: Uuid::new_v4(),
    status: NodeStatus::Idle,
    cpu_cores: 8.0,
    memory_mb: 16384,
    storage_gb: 200,
    gpu_available: false,
    cpu_usage_percent: 0.0,
    memory_usage_percent: 0.0,
    region: region.to_string(),
  }
}

fn sample_resources() -> DeploymentResources {
  DeploymentResources {
    cpu_cores: 1.0,
    memory_mb: 512,
    gpu_units: 0,
    storage_gb: 5,
  }
}

/// Builds an `AppState` wired entirely from in-memory/mock ports, plus a
/// placement worker that mirrors what `main` wires up in production. The
/// caller is responsible for cancelling `shutdown` and awaiting the
/// returned join handle once done with the state.
async fn build_state() -> (AppState, CancellationToken, tokio::task::JoinHandle<()>) {
  let persistence: Arc<dyn Persistence> = Arc::new(InMemoryPersistence::new());
  persistence.ensure_indexes().await.unwrap();
  let runtime = Arc::new(MockContainerRuntime::new());
  let nodes = Arc::new(InMemoryNodeDirectory::new());
  nodes.seed(sample_node("us-east")).await;
  let tokens = Arc::new(LedgerTokenSystem::new());
  let hooks = Arc::new(Hooks::new());

  let shutdown = CancellationToken::new();
  let worker_persistence = persistence.clone();
  let worker_runtime: Arc<dyn fog_core::ports::ContainerRuntime> = runtime.clone();
  let worker_nodes: Arc<dyn NodeDirectory> = nodes.clone();
  let (placement_queue, worker_handle) = spawn_worker(
    64,
    shutdown.clone(),
    move |job| {
      let persistence = worker_persistence.clone();
      let runtime = worker_runtime.clone();
      let nodes = worker_nodes.clone();
      async move {
        run_placement_job(persistence, runtime, nodes, job).await.unwrap();
      }
    },
  );

  let state = AppState {
    config: Arc::new(test_config()),
    persistence,
    runtime,
    tokens,
    nodes,
    placement_queue,
    hooks,
    deployment_cache: Arc::new(cache::CloneCache::default()),
    audit: Arc::new(AuditLog::new()),
    metrics: Arc::new(SettlementMetrics::new()),
  };
  (state, shutdown, worker_handle)
}

/// Test-side mirror of the placement job handler `main` wires the
/// worker to - exercises the same public API a production handler would.
async fn run_placement_job(
  persistence: Arc<dyn Persistence>,
  runtime: Arc<dyn fog_core::ports::ContainerRuntime>,
  nodes: Arc<dyn NodeDirectory>,
  job: fog_core::scheduler::queue::PlacementJob,
) -> anyhow::Result<()> {
  let Some(deployment) = persistence.get_deployment(job.deployment_id).await? else {
    return Ok(());
  };
  let sibling_replicas = persistence.list_replicas(job.deployment_id).await?;
  let Some(replica) = sibling_replicas
    .iter()
    .find(|r| r.id == job.replica_id)
    .cloned()
  else {
    return Ok(());
  };

  let occupied_by_siblings: std::collections::HashSet<_> = sibling_replicas
    .iter()
    .filter(|r| r.id != replica.id)
    .filter_map(|r| r.node_id)
    .collect();

  let candidates: Vec<_> = nodes
    .schedulable_nodes()
    .await?
    .into_iter()
    .filter(|n| !occupied_by_siblings.contains(&n.id))
    .collect();
  let Some((node, _score)) =
    scheduler::select_node(&candidates, &deployment.resources, None)
  else {
    controller::mark_replica_failed(persistence.as_ref(), replica, Some("no capacity".to_string()))
      .await
      .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    return Ok(());
  };
  let node_id = node.id;

  let handle = runtime
    .start(&deployment.container_image, &deployment.resources)
    .await?;
  nodes
    .record_placement(node_id, deployment.resources.cpu_cores, deployment.resources.memory_mb)
    .await?;

  let mut replica = replica;
  replica.node_id = Some(node_id);
  persistence.update_replica(replica.clone()).await?;

  controller::mark_replica_running(persistence.as_ref(), replica, handle)
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
  Ok(())
}

async fn settle(state: &AppState, shutdown: CancellationToken, worker: tokio::task::JoinHandle<()>) {
  shutdown.cancel();
  worker.await.unwrap();
  let _ = state;
}

fn create_request(name: &str, replicas: u32) -> CreateDeploymentRequest {
  CreateDeploymentRequest {
    name: name.to_string(),
    container_image: "ghcr.io/example/worker:latest".to_string(),
    target_replicas: replicas,
    resources: sample_resources(),
  }
}

#[tokio::test]
async fn create_deployment_reaches_running_once_placed() {
  let (state, shutdown, worker) = build_state().await;

  let deployment = controller::create_deployment(&state, "alice", create_request("web", 1))
    .await
    .unwrap();
  assert_eq!(deployment.status, DeploymentStatus::Pending);

  // give the placement worker a chance to drain the single job.
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  let refreshed = controller::get_live_deployment(&state, deployment.id).await.unwrap();
  assert_eq!(refreshed.status, DeploymentStatus::Running);

  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  assert_eq!(replicas.len(), 1);
  assert_eq!(replicas[0].status, ReplicaStatus::Running);
  assert!(replicas[0].node_id.is_some());

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn duplicate_live_name_is_rejected() {
  let (state, shutdown, worker) = build_state().await;

  controller::create_deployment(&state, "alice", create_request("api", 1))
    .await
    .unwrap();
  let err = controller::create_deployment(&state, "alice", create_request("api", 1))
    .await
    .unwrap_err();
  assert!(matches!(err, fog_core::error::AppError::DuplicateDeploymentName(_)));

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn deployment_fails_when_no_node_has_capacity() {
  // an empty node directory means the scheduler can never place anything.
  let persistence: Arc<dyn Persistence> = Arc::new(InMemoryPersistence::new());
  persistence.ensure_indexes().await.unwrap();
  let runtime = Arc::new(MockContainerRuntime::new());
  let nodes = Arc::new(InMemoryNodeDirectory::new());
  let tokens = Arc::new(LedgerTokenSystem::new());
  let hooks = Arc::new(Hooks::new());
  let shutdown = CancellationToken::new();
  let worker_persistence = persistence.clone();
  let worker_runtime: Arc<dyn fog_core::ports::ContainerRuntime> = runtime.clone();
  let worker_nodes: Arc<dyn NodeDirectory> = nodes.clone();
  let (placement_queue, worker) = spawn_worker(64, shutdown.clone(), move |job| {
    let persistence = worker_persistence.clone();
    let runtime = worker_runtime.clone();
    let nodes = worker_nodes.clone();
    async move {
      run_placement_job(persistence, runtime, nodes, job).await.unwrap();
    }
  });
  let state = AppState {
    config: Arc::new(test_config()),
    persistence,
    runtime,
    tokens,
    nodes,
    placement_queue,
    hooks,
    deployment_cache: Arc::new(cache::CloneCache::default()),
    audit: Arc::new(AuditLog::new()),
    metrics: Arc::new(SettlementMetrics::new()),
  };

  let deployment = controller::create_deployment(&state, "gail", create_request("lonely", 1))
    .await
    .unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  let refreshed = state.persistence.get_deployment(deployment.id).await.unwrap().unwrap();
  assert_eq!(refreshed.status, DeploymentStatus::Failed);
  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  assert_eq!(replicas[0].status, ReplicaStatus::Failed);

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn scale_up_then_down_adjusts_replica_count() {
  let (state, shutdown, worker) = build_state().await;

  let deployment = controller::create_deployment(&state, "bob", create_request("batch", 1))
    .await
    .unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  controller::scale_deployment(&state, deployment.id, 3).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;
  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  assert_eq!(replicas.len(), 3);

  controller::scale_deployment(&state, deployment.id, 1).await.unwrap();
  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  let stopped = replicas.iter().filter(|r| r.status == ReplicaStatus::Stopped).count();
  assert_eq!(stopped, 2);

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn replicas_of_one_deployment_never_share_a_node() {
  let persistence: Arc<dyn Persistence> = Arc::new(InMemoryPersistence::new());
  persistence.ensure_indexes().await.unwrap();
  let runtime = Arc::new(MockContainerRuntime::new());
  let nodes = Arc::new(InMemoryNodeDirectory::new());
  for _ in 0..3 {
    nodes.seed(sample_node("us-east")).await;
  }
  let tokens = Arc::new(LedgerTokenSystem::new());
  let hooks = Arc::new(Hooks::new());
  let shutdown = CancellationToken::new();
  let worker_persistence = persistence.clone();
  let worker_runtime: Arc<dyn fog_core::ports::ContainerRuntime> = runtime.clone();
  let worker_nodes: Arc<dyn NodeDirectory> = nodes.clone();
  let (placement_queue, worker) = spawn_worker(64, shutdown.clone(), move |job| {
    let persistence = worker_persistence.clone();
    let runtime = worker_runtime.clone();
    let nodes = worker_nodes.clone();
    async move {
      run_placement_job(persistence, runtime, nodes, job).await.unwrap();
    }
  });
  let state = AppState {
    config: Arc::new(test_config()),
    persistence,
    runtime,
    tokens,
    nodes,
    placement_queue,
    hooks,
    deployment_cache: Arc::new(cache::CloneCache::default()),
    audit: Arc::new(AuditLog::new()),
    metrics: Arc::new(SettlementMetrics::new()),
  };

  let deployment = controller::create_deployment(&state, "heidi", create_request("fanout", 3))
    .await
    .unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  let node_ids: std::collections::HashSet<_> =
    replicas.iter().filter_map(|r| r.node_id).collect();
  assert_eq!(node_ids.len(), 3, "each replica must land on a distinct node");

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn delete_stops_replicas_and_soft_deletes() {
  let (state, shutdown, worker) = build_state().await;

  let deployment = controller::create_deployment(&state, "carol", create_request("job", 2))
    .await
    .unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  controller::delete_deployment(&state, deployment.id).await.unwrap();

  let fetched = state.persistence.get_deployment(deployment.id).await.unwrap().unwrap();
  assert!(fetched.is_deleted());
  assert_eq!(fetched.status, DeploymentStatus::Stopped);

  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  assert!(replicas.iter().all(|r| r.status == ReplicaStatus::Stopped));

  // the name is free again for reuse once the original is soft-deleted.
  controller::create_deployment(&state, "carol", create_request("job", 1))
    .await
    .unwrap();

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn cleanup_distributes_pending_rewards() {
  let (state, shutdown, worker) = build_state().await;

  let deployment = controller::create_deployment(&state, "dave", create_request("stream", 1))
    .await
    .unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  state
    .persistence
    .queue_pending_reward(PendingReward {
      reward_id: Uuid::new_v4(),
      account_id: "dave".to_string(),
      amount: Decimal::new(250, 2),
      reason: "runtime accrual".to_string(),
      deployment_id: Some(deployment.id),
      reward_type: RewardType::Runtime,
      metadata: Default::default(),
      created_at: chrono::Utc::now(),
    })
    .await
    .unwrap();

  let summary = settlement::cleanup_with_distribution(&state, deployment.id).await.unwrap();
  assert!(summary.success);
  assert!(summary.cleanup_completed);
  assert!(!summary.rollback_occurred);
  assert!(summary.error.is_none());
  assert_eq!(summary.replicas_stopped, 1);
  assert_eq!(summary.rewards_distributed, 1);
  assert_eq!(summary.rewards_failed, 0);
  assert_eq!(summary.total_distributed, Decimal::new(250, 2));
  assert_eq!(state.tokens.balance("dave").await.unwrap(), Decimal::new(250, 2));

  let fetched = state.persistence.get_deployment(deployment.id).await.unwrap().unwrap();
  assert!(fetched.is_deleted());

  settle(&state, shutdown, worker).await;
}

/// `TokenSystem` double that fails any distribution to a specific
/// account, so the settlement rollback path can be exercised without a
/// real ledger ever failing a transfer.
#[derive(Default)]
struct FlakyTokenSystem {
  inner: LedgerTokenSystem,
}

#[async_trait::async_trait]
impl fog_core::ports::TokenSystem for FlakyTokenSystem {
  async fn distribute(
    &self,
    account_id: &str,
    amount: Decimal,
  ) -> anyhow::Result<String> {
    if account_id == "fail-me" {
      anyhow::bail!("simulated transfer failure");
    }
    self.inner.distribute(account_id, amount).await
  }

  async fn rollback(&self, transfer_tx_id: &str) -> anyhow::Result<String> {
    self.inner.rollback(transfer_tx_id).await
  }

  async fn balance(&self, account_id: &str) -> anyhow::Result<Decimal> {
    self.inner.balance(account_id).await
  }

  async fn staked_balance(&self, account_id: &str) -> anyhow::Result<Decimal> {
    self.inner.staked_balance(account_id).await
  }

  async fn last_reward_time(
    &self,
    account_id: &str,
  ) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
    self.inner.last_reward_time(account_id).await
  }

  async fn record_staking_reward(
    &self,
    account_id: &str,
    at: chrono::DateTime<chrono::Utc>,
  ) -> anyhow::Result<()> {
    self.inner.record_staking_reward(account_id, at).await
  }
}

#[tokio::test]
async fn settlement_rolls_back_on_distribution_failure() {
  let persistence: Arc<dyn Persistence> = Arc::new(InMemoryPersistence::new());
  persistence.ensure_indexes().await.unwrap();
  let runtime = Arc::new(MockContainerRuntime::new());
  let nodes = Arc::new(InMemoryNodeDirectory::new());
  nodes.seed(sample_node("us-east")).await;
  let tokens: Arc<dyn fog_core::ports::TokenSystem> = Arc::new(FlakyTokenSystem::default());
  let hooks = Arc::new(Hooks::new());
  let shutdown = CancellationToken::new();
  let worker_persistence = persistence.clone();
  let worker_runtime: Arc<dyn fog_core::ports::ContainerRuntime> = runtime.clone();
  let worker_nodes: Arc<dyn NodeDirectory> = nodes.clone();
  let (placement_queue, worker) = spawn_worker(64, shutdown.clone(), move |job| {
    let persistence = worker_persistence.clone();
    let runtime = worker_runtime.clone();
    let nodes = worker_nodes.clone();
    async move {
      run_placement_job(persistence, runtime, nodes, job).await.unwrap();
    }
  });
  let state = AppState {
    config: Arc::new(test_config()),
    persistence,
    runtime,
    tokens,
    nodes,
    placement_queue,
    hooks,
    deployment_cache: Arc::new(cache::CloneCache::default()),
    audit: Arc::new(AuditLog::new()),
    metrics: Arc::new(SettlementMetrics::new()),
  };

  let deployment = controller::create_deployment(&state, "grace", create_request("pipeline", 1))
    .await
    .unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  state
    .persistence
    .queue_pending_reward(PendingReward {
      reward_id: Uuid::new_v4(),
      account_id: "grace".to_string(),
      amount: Decimal::new(500, 2),
      reason: "runtime accrual".to_string(),
      deployment_id: Some(deployment.id),
      reward_type: RewardType::Runtime,
      metadata: Default::default(),
      created_at: chrono::Utc::now(),
    })
    .await
    .unwrap();
  state
    .persistence
    .queue_pending_reward(PendingReward {
      reward_id: Uuid::new_v4(),
      account_id: "fail-me".to_string(),
      amount: Decimal::new(300, 2),
      reason: "runtime accrual".to_string(),
      deployment_id: Some(deployment.id),
      reward_type: RewardType::Runtime,
      metadata: Default::default(),
      created_at: chrono::Utc::now(),
    })
    .await
    .unwrap();

  let err = settlement::cleanup_with_distribution(&state, deployment.id).await.unwrap_err();
  assert!(matches!(
    err,
    fog_core::error::AppError::RewardDistributionFailed { .. }
  ));

  // the first reward's distribution was rolled back, not left paid out.
  assert_eq!(state.tokens.balance("grace").await.unwrap(), Decimal::ZERO);
  assert_eq!(
    state.metrics.rolled_back_total.load(std::sync::atomic::Ordering::Relaxed),
    1
  );

  // cleanup never ran: the deployment and its replica survive untouched.
  let fetched = state.persistence.get_deployment(deployment.id).await.unwrap().unwrap();
  assert!(!fetched.is_deleted());
  let replicas = state.persistence.list_replicas(deployment.id).await.unwrap();
  assert!(replicas.iter().any(|r| r.status == ReplicaStatus::Running));

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn rollback_reverses_a_distributed_reward() {
  let (state, shutdown, worker) = build_state().await;

  let transfer_tx_id = state.tokens.distribute("erin", Decimal::new(100, 2)).await.unwrap();
  assert_eq!(state.tokens.balance("erin").await.unwrap(), Decimal::new(100, 2));

  let distribution = fog_client::entities::reward::RewardDistribution {
    id: Uuid::new_v4(),
    reward_id: Uuid::new_v4(),
    account_id: "erin".to_string(),
    amount: Decimal::new(100, 2),
    reward_type: RewardType::Staking,
    status: fog_client::entities::reward::DistributionStatus::Distributed,
    created_at: chrono::Utc::now(),
    distributed_at: Some(chrono::Utc::now()),
    rolled_back_at: None,
    transfer_tx_id: Some(transfer_tx_id),
    rollback_tx_id: None,
    error_message: None,
  };
  state.persistence.record_distribution(distribution.clone()).await.unwrap();

  let rolled_back = settlement::rollback_distribution(&state, distribution).await.unwrap();
  assert_eq!(
    rolled_back.status,
    fog_client::entities::reward::DistributionStatus::RolledBack
  );
  assert_eq!(state.tokens.balance("erin").await.unwrap(), Decimal::ZERO);

  settle(&state, shutdown, worker).await;
}

#[tokio::test]
async fn rollback_of_non_distributed_reward_is_rejected() {
  let (state, shutdown, worker) = build_state().await;

  let distribution = fog_client::entities::reward::RewardDistribution {
    id: Uuid::new_v4(),
    reward_id: Uuid::new_v4(),
    account_id: "frank".to_string(),
    amount: Decimal::new(10, 2),
    reward_type: RewardType::Runtime,
    status: fog_client::entities::reward::DistributionStatus::Failed,
    created_at: chrono::Utc::now(),
    distributed_at: None,
    rolled_back_at: None,
    transfer_tx_id: None,
    rollback_tx_id: None,
    error_message: Some("insufficient balance".to_string()),
  };

  let err = settlement::rollback_distribution(&state, distribution).await.unwrap_err();
  assert!(matches!(err, fog_core::error::AppError::InvalidRequest(_)));

  settle(&state, shutdown, worker).await;
}
