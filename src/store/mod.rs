pub mod disk;
pub mod memory;

use crate::core::cache::SnapshotStore;
use crate::core::config::AppConfig;
use disk::DiskStore;
use memory::MemoryStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens the on-disk snapshot store under the configured data directory,
/// falling back to memory when the directory is unusable.
pub fn open_default(config: &AppConfig) -> Arc<dyn SnapshotStore> {
    let opened = config
        .data_path()
        .and_then(|path| DiskStore::open(&path.join("cache")));

    match opened {
        Ok(store) => {
            debug!("Using on-disk snapshot store");
            Arc::new(store)
        }
        Err(e) => {
            warn!("Falling back to in-memory snapshot store: {:#}", e);
            Arc::new(MemoryStore::new())
        }
    }
}
