use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use fog_client::entities::Id;
use fog_client::entities::node::{Node, NodeStatus};

use crate::ports::node_directory::NodeDirectory;

/// In-memory fleet membership/telemetry source. Real node registration
/// (heartbeats, agent enrollment) is out of scope; this is seeded once
/// at startup and mutated only by scheduler placement/release calls.
#[derive(Debug, Default)]
pub struct InMemoryNodeDirectory {
  nodes: RwLock<HashMap<Id, Node>>,
}

impl InMemoryNodeDirectory {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn seed(&self, node: Node) {
    self.nodes.write().await.insert(node.id, node);
  }
}

#[async_trait]
impl NodeDirectory for InMemoryNodeDirectory {
  async fn schedulable_nodes(&self) -> anyhow::Result<Vec<Node>> {
    Ok(
      self
        .nodes
        .read()
        .await
        .values()
        .filter(|n| n.is_schedulable())
        .cloned()
        .collect(),
    )
  }

  async fn get(&self, node_id: Id) -> anyhow::Result<Option<Node>> {
    Ok(self.nodes.read().await.get(&node_id).cloned())
  }

  async fn record_placement(
    &self,
    node_id: Id,
    cpu_cores: f64,
    memory_mb: u32,
  ) -> anyhow::Result<()> {
    let mut nodes = self.nodes.write().await;
    if let Some(node) = nodes.get_mut(&node_id) {
      let cpu_used = node.cpu_usage_percent / 100.0 * node.cpu_cores
        + cpu_cores;
      node.cpu_usage_percent =
        (cpu_used / node.cpu_cores * 100.0).min(100.0);
      let mem_used = node.memory_usage_percent / 100.0
        * node.memory_mb as f64
        + memory_mb as f64;
      node.memory_usage_percent =
        (mem_used / node.memory_mb as f64 * 100.0).min(100.0);
      if node.cpu_usage_percent >= 95.0 || node.memory_usage_percent >= 95.0
      {
        node.status = NodeStatus::Busy;
      } else if node.status == NodeStatus::Idle {
        node.status = NodeStatus::Active;
      }
    }
    Ok(())
  }

  async fn record_release(
    &self,
    node_id: Id,
    cpu_cores: f64,
    memory_mb: u32,
  ) -> anyhow::Result<()> {
    let mut nodes = self.nodes.write().await;
    if let Some(node) = nodes.get_mut(&node_id) {
      let cpu_used = (node.cpu_usage_percent / 100.0 * node.cpu_cores
        - cpu_cores)
        .max(0.0);
      node.cpu_usage_percent = cpu_used / node.cpu_cores * 100.0;
      let mem_used = (node.memory_usage_percent / 100.0
        * node.memory_mb as f64
        - memory_mb as f64)
        .max(0.0);
      node.memory_usage_percent = mem_used / node.memory_mb as f64 * 100.0;
      if node.status == NodeStatus::Busy
        && node.cpu_usage_percent < 95.0
        && node.memory_usage_percent < 95.0
      {
        node.status = NodeStatus::Active;
      }
    }
    Ok(())
  }
}
