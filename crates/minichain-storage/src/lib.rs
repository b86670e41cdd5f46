pub mod sled_store;

use anyhow::Result;
use minichain_core::StateSnapshot;

pub use sled_store::SledSnapshotStore;

/// Persistence port for the engine's state mirror. Saves happen after
/// every successful mutating operation; a failed save is reported but
/// never rolls back in-memory state. `load` returning `Err` means the
/// stored snapshot is corrupt, which callers treat as fatal at startup.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &StateSnapshot) -> Result<()>;
    fn load(&self) -> Result<Option<StateSnapshot>>;
}
