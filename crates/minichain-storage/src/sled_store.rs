use crate::SnapshotStore;
use anyhow::{Context, Result};
use minichain_core::StateSnapshot;
use sled::Db;
use std::path::Path;
use tracing::info;

/// Single key holding the bincode-encoded snapshot. The whole snapshot is
/// written in one insert so a restart never sees a half-updated state.
pub const KEY_SNAPSHOT: &[u8] = b"snapshot";

#[derive(Clone)]
pub struct SledSnapshotStore {
    db: Db,
}

impl SledSnapshotStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        info!("sled snapshot store opened");
        Ok(Self { db })
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        let bytes = bincode::serialize(snapshot)?;
        self.db.insert(KEY_SNAPSHOT, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn load(&self) -> Result<Option<StateSnapshot>> {
        match self.db.get(KEY_SNAPSHOT)? {
            Some(bytes) => {
                let snapshot =
                    bincode::deserialize(&bytes).context("persisted snapshot is corrupt")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }
}
