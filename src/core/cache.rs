use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value together with the time it was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub value: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Durable key-value storage for feed snapshots.
///
/// Errors are logged by the implementation and surface as a miss (`get`) or
/// a dropped write (`set`); a broken store only costs an extra upstream fetch.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<StoredRecord>;
    async fn set(&self, key: &str, value: Vec<u8>, timestamp: DateTime<Utc>);
}
