use serde::{Deserialize, Serialize};

use crate::entities::Id;
use crate::entities::deployment::Deployment;
use crate::entities::replica::DeploymentReplica;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDeploymentsQuery {
  pub user_id: Option<String>,
  #[serde(default)]
  pub include_deleted: bool,
}

/// A deployment together with its currently-placed replicas, as returned
/// by the detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentWithDetails {
  #[serde(flatten)]
  pub deployment: Deployment,
  pub replicas: Vec<DeploymentReplica>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusHistoryQuery {
  pub deployment_id: Id,
}
