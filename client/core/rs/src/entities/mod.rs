pub mod deployment;
pub mod history;
pub mod node;
pub mod replica;
pub mod reward;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Opaque 128-bit identifier used for every entity in the control plane.
pub type Id = Uuid;

pub fn new_id() -> Id {
  Uuid::new_v4()
}

pub fn now() -> DateTime<Utc> {
  Utc::now()
}
