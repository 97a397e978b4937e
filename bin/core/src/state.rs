use std::sync::Arc;

use cache::CloneCache;
use fog_client::entities::Id;
use fog_client::entities::deployment::Deployment;

use crate::config::AppConfig;
use crate::hooks::Hooks;
use crate::persistence::Persistence;
use crate::ports::{ContainerRuntime, NodeDirectory, TokenSystem};
use crate::scheduler::queue::PlacementQueue;
use crate::settlement::{AuditLog, SettlementMetrics};

/// The single explicit dependency container for the whole application.
///
/// Every port is an `Arc<dyn Trait>` constructed once in `main` and
/// threaded through axum's `State` extractor - deliberately not a
/// `OnceLock`-backed global, so tests can build as many independent
/// `AppState`s as they like with mock ports and no process-wide mutable
/// state.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub persistence: Arc<dyn Persistence>,
  pub runtime: Arc<dyn ContainerRuntime>,
  pub tokens: Arc<dyn TokenSystem>,
  pub nodes: Arc<dyn NodeDirectory>,
  pub placement_queue: Arc<PlacementQueue>,
  pub hooks: Arc<Hooks>,
  /// Cache of assembled deployment reads, invalidated via `hooks` on
  /// `deployment.created` / `deployment.deleted`.
  pub deployment_cache: Arc<CloneCache<Id, Deployment>>,
  pub audit: Arc<AuditLog>,
  pub metrics: Arc<SettlementMetrics>,
}
