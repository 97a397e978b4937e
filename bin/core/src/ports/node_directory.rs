use async_trait::async_trait;

use fog_client::entities::Id;
use fog_client::entities::node::Node;

/// Abstraction over the fleet membership/telemetry source the scheduler
/// scores candidates against. Backed by [`crate::fleet::InMemoryNodeDirectory`]
/// — real node telemetry ingestion is out of scope (see Non-goals).
#[async_trait]
pub trait NodeDirectory: Send + Sync {
  async fn schedulable_nodes(&self) -> anyhow::Result<Vec<Node>>;

  async fn get(&self, node_id: Id) -> anyhow::Result<Option<Node>>;

  /// Records that a replica was placed on `node_id`, nudging its load
  /// telemetry so subsequent scheduling rounds see the updated usage.
  async fn record_placement(
    &self,
    node_id: Id,
    cpu_cores: f64,
    memory_mb: u32,
  ) -> anyhow::Result<()>;

  async fn record_release(
    &self,
    node_id: Id,
    cpu_cores: f64,
    memory_mb: u32,
  ) -> anyhow::Result<()>;
}
