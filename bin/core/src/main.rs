#[macro_use]
extern crate tracing;

use std::sync::Arc;

use cache::CloneCache;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use fog_core::config::app_config;
use fog_core::fleet::InMemoryNodeDirectory;
use fog_core::hooks::Hooks;
use fog_core::persistence::Persistence;
use fog_core::persistence::memory::InMemoryPersistence;
use fog_core::persistence::mongo::MongoPersistence;
use fog_core::ports::{self, ContainerRuntime};
use fog_core::runtime::docker::DockerContainerRuntime;
use fog_core::runtime::mock::MockContainerRuntime;
use fog_core::scheduler::{self, queue::{PlacementJob, spawn_worker}};
use fog_core::settlement::{AuditLog, SettlementMetrics};
use fog_core::state::AppState;
use fog_core::tokens::ledger::LedgerTokenSystem;
use fog_core::{controller, http};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  let config = app_config();
  logger::init(&config.log)?;

  println!(
    "{} fog-core starting on {}",
    "INFO".green(),
    config.bind_address
  );

  let persistence: Arc<dyn Persistence> = match &config.database_uri {
    Some(uri) => {
      let mongo =
        MongoPersistence::connect(uri, &config.database_db_name).await?;
      mongo.ensure_indexes().await?;
      Arc::new(mongo)
    }
    None => {
      warn!(
        "FOG_DATABASE_URI not set, running against in-memory persistence"
      );
      let mem = InMemoryPersistence::new();
      mem.ensure_indexes().await?;
      Arc::new(mem)
    }
  };

  let runtime: Arc<dyn ContainerRuntime> = if config.docker_enabled {
    match DockerContainerRuntime::connect() {
      Ok(docker) => Arc::new(docker),
      Err(e) if config.mock_fallback_on_runtime_error => {
        warn!(
          "docker runtime unavailable ({e:#}), falling back to mock runtime"
        );
        Arc::new(MockContainerRuntime::new())
      }
      Err(e) => {
        return Err(e.context("docker runtime required but unavailable"));
      }
    }
  } else {
    Arc::new(MockContainerRuntime::new())
  };

  let nodes = Arc::new(InMemoryNodeDirectory::new());
  let tokens = Arc::new(LedgerTokenSystem::new());
  let hooks = Arc::new(Hooks::new());
  let deployment_cache = Arc::new(CloneCache::default());
  let audit = Arc::new(AuditLog::new());
  let metrics = Arc::new(SettlementMetrics::new());

  let shutdown = CancellationToken::new();
  let worker_persistence = persistence.clone();
  let worker_runtime = runtime.clone();
  let worker_nodes = nodes.clone();
  let (placement_queue, worker_handle) = spawn_worker(
    1024,
    shutdown.clone(),
    move |job: PlacementJob| {
      let persistence = worker_persistence.clone();
      let runtime = worker_runtime.clone();
      let nodes = worker_nodes.clone();
      async move {
        if let Err(e) =
          run_placement_job(persistence, runtime, nodes, job).await
        {
          error!("placement job failed | {e:#}");
        }
      }
    },
  );

  let state = AppState {
    config: Arc::new(config.clone()),
    persistence,
    runtime,
    tokens,
    nodes,
    placement_queue,
    hooks,
    deployment_cache,
    audit,
    metrics,
  };

  let app = http::router(state).layer(config.cors_layer());
  let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

  shutdown.cancel();
  worker_handle.await?;
  Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
  let _ = tokio::signal::ctrl_c().await;
  info!("received shutdown signal");
  shutdown.cancel();
}

/// Placement of a single replica: pick a node, start its container,
/// record the placement, and mark the replica running. Run off the
/// placement queue so HTTP handlers never block on scheduling.
async fn run_placement_job(
  persistence: Arc<dyn Persistence>,
  runtime: Arc<dyn ContainerRuntime>,
  nodes: Arc<dyn ports::NodeDirectory>,
  job: PlacementJob,
) -> anyhow::Result<()> {
  let Some(deployment) =
    persistence.get_deployment(job.deployment_id).await?
  else {
    return Ok(());
  };
  let sibling_replicas =
    persistence.list_replicas(job.deployment_id).await?;
  let Some(replica) = sibling_replicas
    .iter()
    .find(|r| r.id == job.replica_id)
    .cloned()
  else {
    return Ok(());
  };

  // A node already hosting another replica of this same deployment is
  // excluded so distinct jobs for one deployment never co-locate two of
  // its replicas on the same node.
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
    warn!(
      deployment_id = %job.deployment_id,
      replica_id = %job.replica_id,
      "no schedulable node has capacity for this replica"
    );
    controller::mark_replica_failed(
      persistence.as_ref(),
      replica,
      Some("no schedulable node has capacity".to_string()),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    return Ok(());
  };
  let node_id = node.id;

  let handle = runtime
    .start(&deployment.container_image, &deployment.resources)
    .await?;
  nodes
    .record_placement(
      node_id,
      deployment.resources.cpu_cores,
      deployment.resources.memory_mb,
    )
    .await?;

  let mut replica = replica;
  replica.node_id = Some(node_id);
  persistence.update_replica(replica.clone()).await?;

  info!(
    deployment_id = %job.deployment_id,
    replica_id = %job.replica_id,
    node_id = %node_id,
    "placed replica"
  );

  controller::mark_replica_running(persistence.as_ref(), replica, handle)
    .await
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;

  Ok(())
}
