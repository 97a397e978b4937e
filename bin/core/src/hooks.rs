use std::sync::RwLock;

use fog_client::entities::Id;

/// Lifecycle events an external cache layer (or anything else) can
/// subscribe to, instead of the core depending on a cache crate
/// directly - see [`cache::CloneCache`] for how the core uses caching
/// internally.
#[derive(Debug, Clone, Copy)]
pub enum DeploymentEvent {
  Created(Id),
  Deleted(Id),
}

type Callback = Box<dyn Fn(DeploymentEvent) + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
  callbacks: RwLock<Vec<Callback>>,
}

impl Hooks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe<F>(&self, callback: F)
  where
    F: Fn(DeploymentEvent) + Send + Sync + 'static,
  {
    self.callbacks.write().unwrap().push(Box::new(callback));
  }

  pub fn fire(&self, event: DeploymentEvent) {
    for callback in self.callbacks.read().unwrap().iter() {
      callback(event);
    }
  }
}

impl std::fmt::Debug for Hooks {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Hooks")
      .field("subscriber_count", &self.callbacks.read().unwrap().len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  #[test]
  fn subscribers_are_notified() {
    let hooks = Hooks::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    hooks.subscribe(move |_event| {
      count_clone.fetch_add(1, Ordering::SeqCst);
    });
    hooks.fire(DeploymentEvent::Created(uuid::Uuid::new_v4()));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }
}
