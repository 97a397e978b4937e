pub mod queue;

use fog_client::entities::deployment::DeploymentResources;
use fog_client::entities::node::Node;

use crate::config;

const RESOURCE_WEIGHT: f64 = 0.40;
const LOAD_WEIGHT: f64 = 0.30;
const LOCALITY_WEIGHT: f64 = 0.30;

/// Score breakdown for one candidate node, kept around so placement
/// decisions can be logged/audited, not just the final pick.
#[derive(Debug, Clone, Copy)]
pub struct NodeScore {
  pub resource_score: f64,
  pub load_score: f64,
  pub locality_score: f64,
  pub total: f64,
}

impl NodeScore {
  fn compute(
    resource_score: f64,
    load_score: f64,
    locality_score: f64,
  ) -> Self {
    Self {
      resource_score,
      load_score,
      locality_score,
      total: resource_score * RESOURCE_WEIGHT
        + load_score * LOAD_WEIGHT
        + locality_score * LOCALITY_WEIGHT,
    }
  }
}

/// Headroom `node` would have left after satisfying `resources`,
/// relative to its total capacity, clamped to `[0, 1]`. A node that
/// cannot satisfy the request scores 0 here, which [`score_node`] then
/// treats as disqualifying.
fn resource_score(node: &Node, resources: &DeploymentResources) -> f64 {
  if resources.gpu_units > 0 && !node.gpu_available {
    return 0.0;
  }
  let free_cpu =
    node.cpu_cores * (1.0 - node.cpu_usage_percent / 100.0);
  let free_mem =
    node.memory_mb as f64 * (1.0 - node.memory_usage_percent / 100.0);
  if free_cpu < resources.cpu_cores
    || free_mem < resources.memory_mb as f64
    || node.storage_gb < resources.storage_gb
  {
    return 0.0;
  }
  let cpu_term = (free_cpu - resources.cpu_cores) / node.cpu_cores;
  let mem_term =
    (free_mem - resources.memory_mb as f64) / node.memory_mb as f64;
  ((cpu_term + mem_term) / 2.0).clamp(0.0, 1.0)
}

/// Inverse of current utilization: an idle node scores 1.0, a fully
/// loaded one scores 0.0.
fn load_score(node: &Node) -> f64 {
  let avg_usage =
    (node.cpu_usage_percent + node.memory_usage_percent) / 2.0;
  (1.0 - avg_usage / 100.0).clamp(0.0, 1.0)
}

/// How close `node` is to `preferred_region`, derived from the region
/// latency matrix. Lower latency -> higher score.
fn locality_score(node: &Node, preferred_region: Option<&str>) -> f64 {
  let Some(preferred) = preferred_region else {
    return 0.5;
  };
  let latency = config::region_latency_ms(preferred, &node.region);
  (1.0 - latency / config::MAX_LATENCY_MS).clamp(0.0, 1.0)
}

pub fn score_node(
  node: &Node,
  resources: &DeploymentResources,
  preferred_region: Option<&str>,
) -> NodeScore {
  NodeScore::compute(
    resource_score(node, resources),
    load_score(node),
    locality_score(node, preferred_region),
  )
}

/// Picks the best schedulable node for one replica, deterministically
/// breaking ties by lexicographically smallest node id. Returns `None`
/// when no candidate has any usable capacity.
pub fn select_node<'a>(
  candidates: &'a [Node],
  resources: &DeploymentResources,
  preferred_region: Option<&str>,
) -> Option<(&'a Node, NodeScore)> {
  let mut scored: Vec<(&Node, NodeScore)> = candidates
    .iter()
    .map(|node| (node, score_node(node, resources, preferred_region)))
    .filter(|(_, score)| score.resource_score > 0.0)
    .collect();
  scored.sort_by(|(a_node, a_score), (b_node, b_score)| {
    b_score
      .total
      .partial_cmp(&a_score.total)
      .unwrap()
      .then_with(|| a_node.id.cmp(&b_node.id))
  });
  scored.into_iter().next()
}
