use crate::core::cache::{SnapshotStore, StoredRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const PARTITION: &str = "feed";

/// fjall-backed store that survives restarts.
///
/// A record is written as two keys in one batch: `{key}` holds the value and
/// `{key}.captured_at` holds the RFC 3339 timestamp.
pub struct DiskStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create cache directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open cache at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open cache partition")?;

        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn timestamp_key(key: &str) -> String {
        format!("{key}.captured_at")
    }

    fn read(&self, key: &str) -> Result<Option<StoredRecord>> {
        let Some(value) = self.partition.get(key)? else {
            return Ok(None);
        };
        let Some(timestamp) = self.partition.get(Self::timestamp_key(key))? else {
            return Ok(None);
        };

        let timestamp = std::str::from_utf8(&timestamp)?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .with_context(|| format!("Invalid timestamp for key {key}: {timestamp}"))?
            .with_timezone(&Utc);

        Ok(Some(StoredRecord {
            value: value.to_vec(),
            timestamp,
        }))
    }

    fn write(&self, key: &str, value: &[u8], timestamp: DateTime<Utc>) -> Result<()> {
        let mut batch = self.keyspace.batch();
        batch.insert(&self.partition, key, value);
        batch.insert(
            &self.partition,
            Self::timestamp_key(key),
            timestamp.to_rfc3339().as_bytes(),
        );
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for DiskStore {
    async fn get(&self, key: &str) -> Option<StoredRecord> {
        match self.read(key) {
            Ok(Some(record)) => {
                debug!("Store HIT for key: {}", key);
                Some(record)
            }
            Ok(None) => {
                debug!("Store MISS for key: {}", key);
                None
            }
            Err(e) => {
                debug!("DiskStore get error: {}", e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, timestamp: DateTime<Utc>) {
        match self.write(key, &value, timestamp) {
            Ok(()) => debug!("Store PUT for key: {}", key),
            Err(e) => debug!("DiskStore put error: {}", e),
        }
    }
}
