use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use fog_client::entities::deployment::DeploymentResources;

use crate::ports::container_runtime::{
  ContainerHandle, ContainerRuntime, ContainerState,
};

/// In-process fake of a container runtime. Every "container" it starts is
/// just an entry in a concurrent map, immediately reported as running.
///
/// This is the default runtime (see [`crate::config::AppConfig::docker_enabled`])
/// and the mandatory fallback when the real Docker runtime can't be
/// reached, so the control plane is always exercisable without a local
/// Docker daemon.
#[derive(Debug, Default)]
pub struct MockContainerRuntime {
  containers: DashMap<ContainerHandle, bool>,
}

impl MockContainerRuntime {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ContainerRuntime for MockContainerRuntime {
  async fn start(
    &self,
    _image: &str,
    _resources: &DeploymentResources,
  ) -> anyhow::Result<ContainerHandle> {
    let handle = format!("mock-{}", Uuid::new_v4());
    self.containers.insert(handle.clone(), true);
    Ok(handle)
  }

  async fn stop(&self, handle: &ContainerHandle) -> anyhow::Result<()> {
    self.containers.insert(handle.clone(), false);
    Ok(())
  }

  async fn state(
    &self,
    handle: &ContainerHandle,
  ) -> anyhow::Result<ContainerState> {
    match self.containers.get(handle).map(|running| *running) {
      Some(true) => Ok(ContainerState::Running),
      Some(false) => Ok(ContainerState::Exited),
      None => Ok(ContainerState::NotFound),
    }
  }
}
