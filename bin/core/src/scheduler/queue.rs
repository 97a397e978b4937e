use std::sync::Arc;

use fog_client::entities::Id;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One unit of placement work: "find a node for this replica of this
/// deployment". The worker drains these in FIFO order; a full queue
/// rejects new submissions rather than spawning unbounded placement
/// tasks or stalling the submitting request.
#[derive(Debug, Clone)]
pub struct PlacementJob {
  pub deployment_id: Id,
  pub replica_id: Id,
}

/// Why a job could not be handed to the worker. Kept distinct from a
/// generic `anyhow::Error` so callers can tell a saturated queue (caller
/// should retry / surface `QueueFull`) from a dead worker (unrecoverable).
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
  #[error("placement queue is full")]
  QueueFull,
  #[error("placement worker has shut down")]
  WorkerShutDown,
}

pub struct PlacementQueue {
  sender: mpsc::Sender<PlacementJob>,
}

impl PlacementQueue {
  /// Non-blocking: a full queue rejects immediately rather than making
  /// the caller wait for room, so an HTTP handler can turn this straight
  /// into a synchronous `503 QueueFull` instead of stalling the request.
  pub fn submit(&self, job: PlacementJob) -> Result<(), SubmitError> {
    self.sender.try_send(job).map_err(|e| match e {
      mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
      mpsc::error::TrySendError::Closed(_) => SubmitError::WorkerShutDown,
    })
  }
}

/// Spawns the background worker and returns the handle used to submit
/// jobs to it. `handler` is invoked once per job, with worker shutdown
/// triggered by `shutdown`.
pub fn spawn_worker<F, Fut>(
  capacity: usize,
  shutdown: CancellationToken,
  handler: F,
) -> (Arc<PlacementQueue>, tokio::task::JoinHandle<()>)
where
  F: Fn(PlacementJob) -> Fut + Send + Sync + 'static,
  Fut: std::future::Future<Output = ()> + Send,
{
  let (sender, mut receiver) = mpsc::channel(capacity);
  let queue = Arc::new(PlacementQueue { sender });
  let handle = tokio::spawn(async move {
    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
          tracing::info!("placement worker shutting down");
          break;
        }
        job = receiver.recv() => {
          match job {
            Some(job) => handler(job).await,
            None => break,
          }
        }
      }
    }
  });
  (queue, handle)
}
