//! Friend: a directed subscription edge between two persons.
//!
//! The edge never changes when its target is promoted from contact to user.
//! Whether it is *visible* is decided at read time from the target's current
//! registration state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `(user_id, related_user_id)` is unique per ordered pair; `(A, B)` and
/// `(B, A)` are two distinct edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
  pub friend_id:       Uuid,
  /// The subscriber.
  pub user_id:         Uuid,
  /// The person subscribed to; may still be a contact.
  pub related_user_id: Uuid,
  pub created_at:      DateTime<Utc>,
}

impl Friend {
  /// The `(user, related)` pair of the reverse edge.
  pub fn reversed(&self) -> (Uuid, Uuid) { (self.related_user_id, self.user_id) }
}
