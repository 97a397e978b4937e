use anyhow::Context;
use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{
  CreateContainerOptions, InspectContainerOptions,
  RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::secret::{ContainerCreateBody, HostConfig};

use fog_client::entities::deployment::DeploymentResources;

use crate::ports::container_runtime::{
  ContainerHandle, ContainerRuntime, ContainerState,
};

/// Thin wrapper over the local Docker daemon, the real placement target
/// when [`crate::config::AppConfig::docker_enabled`] is set.
pub struct DockerContainerRuntime {
  docker: Docker,
}

impl DockerContainerRuntime {
  pub fn connect() -> anyhow::Result<Self> {
    let docker = Docker::connect_with_defaults()
      .context("failed to connect to the docker daemon")?;
    Ok(Self { docker })
  }
}

#[async_trait]
impl ContainerRuntime for DockerContainerRuntime {
  async fn start(
    &self,
    image: &str,
    resources: &DeploymentResources,
  ) -> anyhow::Result<ContainerHandle> {
    let name = format!("fog-{}", uuid::Uuid::new_v4());
    let host_config = HostConfig {
      memory: Some(resources.memory_mb as i64 * 1024 * 1024),
      nano_cpus: Some((resources.cpu_cores * 1_000_000_000.0) as i64),
      ..Default::default()
    };
    let body = ContainerCreateBody {
      image: Some(image.to_string()),
      host_config: Some(host_config),
      ..Default::default()
    };
    self
      .docker
      .create_container(
        Some(CreateContainerOptions {
          name: Some(name.clone()),
          ..Default::default()
        }),
        body,
      )
      .await
      .context("failed to create container")?;
    self
      .docker
      .start_container(&name, None::<StartContainerOptions>)
      .await
      .context("failed to start container")?;
    Ok(name)
  }

  async fn stop(&self, handle: &ContainerHandle) -> anyhow::Result<()> {
    self
      .docker
      .stop_container(handle, None::<StopContainerOptions>)
      .await
      .context("failed to stop container")?;
    self
      .docker
      .remove_container(
        handle,
        Some(RemoveContainerOptions {
          force: true,
          ..Default::default()
        }),
      )
      .await
      .context("failed to remove container")?;
    Ok(())
  }

  async fn state(
    &self,
    handle: &ContainerHandle,
  ) -> anyhow::Result<ContainerState> {
    match self
      .docker
      .inspect_container(handle, None::<InspectContainerOptions>)
      .await
    {
      Ok(info) => {
        let running = info
          .state
          .and_then(|s| s.running)
          .unwrap_or(false);
        Ok(if running {
          ContainerState::Running
        } else {
          ContainerState::Exited
        })
      }
      Err(bollard::errors::Error::DockerResponseServerError {
        status_code: 404,
        ..
      }) => Ok(ContainerState::NotFound),
      Err(e) => {
        Err(anyhow::Error::new(e).context("failed to inspect container"))
      }
    }
  }
}
