use chrono::{DateTime as UtcDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::prelude::*;

/// Periodic platform snapshot pushed over the analytics websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
  pub timestamp: UtcDateTime<Utc>,
  #[serde(default)]
  pub active_users: u64,
  #[serde(default)]
  pub total_wallets: u64,
  /// Decimal string, kept as sent.
  #[serde(default)]
  pub swap_volume_24h: Option<String>,
  #[serde(default)]
  pub pending_withdrawals: u64,
  #[serde(flatten)]
  pub extra: HashMap<String, json::Value>,
}

impl Snapshot {
  pub fn from_json(data: &[u8]) -> Result<Self> {
    json::from_slice(data)
      .map_err(|e| Error::Api(format!("Invalid analytics snapshot: {}", e)))
  }
}

/// Holds the most recent snapshot for readers.
pub struct AnalyticsFeed {
  tx: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Default for AnalyticsFeed {
  fn default() -> Self {
    Self::new()
  }
}

impl AnalyticsFeed {
  pub fn new() -> Self {
    let (tx, _) = watch::channel(None);
    Self { tx }
  }

  /// Stores `snapshot` unless a newer one is already held.
  pub fn publish(&self, snapshot: Snapshot) -> bool {
    self.tx.send_if_modified(|current| {
      if current.as_ref().is_some_and(|c| c.timestamp > snapshot.timestamp) {
        trace!("dropping stale snapshot from {}", snapshot.timestamp);
        return false;
      }
      *current = Some(Arc::new(snapshot));
      true
    })
  }

  pub fn latest(&self) -> Option<Arc<Snapshot>> {
    self.tx.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
    self.tx.subscribe()
  }
}
