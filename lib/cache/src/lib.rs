use std::{collections::HashMap, hash::Hash};

use tokio::sync::RwLock;

/// A simple async read-write-locked map of cloneable values.
///
/// Used in place of a cache crate + TTL/event invalidation: the core
/// exposes explicit hooks (see `fog_core::hooks`) for an external cache
/// layer to subscribe to instead of depending on one directly.
#[derive(Debug)]
pub struct CloneCache<K: PartialEq + Eq + Hash, T: Clone>(
  RwLock<HashMap<K, T>>,
);

impl<K: PartialEq + Eq + Hash, T: Clone> Default for CloneCache<K, T> {
  fn default() -> Self {
    Self(RwLock::new(HashMap::new()))
  }
}

impl<K: PartialEq + Eq + Hash + Clone, T: Clone> CloneCache<K, T> {
  pub async fn get(&self, key: &K) -> Option<T> {
    self.0.read().await.get(key).cloned()
  }

  pub async fn get_values(&self) -> Vec<T> {
    self.0.read().await.values().cloned().collect()
  }

  pub async fn get_entries(&self) -> Vec<(K, T)> {
    self
      .0
      .read()
      .await
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }

  pub async fn insert(&self, key: K, val: T) -> Option<T> {
    self.0.write().await.insert(key, val)
  }

  pub async fn remove(&self, key: &K) -> Option<T> {
    self.0.write().await.remove(key)
  }
}

impl<K: PartialEq + Eq + Hash + Clone, T: Clone + Default>
  CloneCache<K, T>
{
  pub async fn get_or_insert_default(&self, key: &K) -> T {
    let mut lock = self.0.write().await;
    match lock.get(key).cloned() {
      Some(item) => item,
      None => {
        let item: T = Default::default();
        lock.insert(key.clone(), item.clone());
        item
      }
    }
  }
}
