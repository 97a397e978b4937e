use async_trait::async_trait;

use fog_client::entities::deployment::DeploymentResources;

/// A handle identifying a running container on whatever runtime placed
/// it. Opaque outside the runtime implementation that issued it.
pub type ContainerHandle = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
  Running,
  Exited,
  NotFound,
}

/// Abstraction over "a thing that can run containers", so the scheduler
/// and controller never talk to Docker (or a node agent) directly.
///
/// Two implementations exist: [`crate::runtime::docker::DockerContainerRuntime`]
/// for real placements and [`crate::runtime::mock::MockContainerRuntime`]
/// for local development and tests, selected by [`crate::config::AppConfig::docker_enabled`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
  async fn start(
    &self,
    image: &str,
    resources: &DeploymentResources,
  ) -> anyhow::Result<ContainerHandle>;

  async fn stop(&self, handle: &ContainerHandle) -> anyhow::Result<()>;

  async fn state(
    &self,
    handle: &ContainerHandle,
  ) -> anyhow::Result<ContainerState>;
}
