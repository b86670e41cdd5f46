use minichain_core::{Allocation, Engine, Transaction};
use minichain_storage::sled_store::KEY_SNAPSHOT;
use minichain_storage::{SledSnapshotStore, SnapshotStore};
use tempfile::tempdir;

fn mined_engine() -> Engine {
    let mut engine = Engine::new(1, &[Allocation::new("alice", 100), Allocation::new("bob", 50)]);
    engine
        .submit_transaction(Transaction::new("alice", "bob", 2))
        .unwrap();
    engine.mine_block("miner");
    engine
}

#[test]
fn save_and_load_round_trip() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = SledSnapshotStore::open(temp_dir.path())?;
    assert!(store.load()?.is_none());

    let engine = mined_engine();
    store.save(&engine.snapshot())?;

    let loaded = store.load()?.expect("snapshot should exist");
    assert_eq!(loaded.chain, engine.chain());
    assert_eq!(loaded.wallets, engine.snapshot().wallets);
    Ok(())
}

#[test]
fn snapshot_survives_reopen() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let engine = mined_engine();
    {
        let store = SledSnapshotStore::open(temp_dir.path())?;
        store.save(&engine.snapshot())?;
    }
    let store = SledSnapshotStore::open(temp_dir.path())?;
    let loaded = store.load()?.expect("snapshot should survive restart");
    assert_eq!(loaded.chain.len(), 2);
    assert_eq!(loaded.wallets.get("miner"), Some(&1));
    Ok(())
}

#[test]
fn save_overwrites_previous_snapshot() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = SledSnapshotStore::open(temp_dir.path())?;

    let mut engine = mined_engine();
    store.save(&engine.snapshot())?;
    engine.mine_block("miner");
    store.save(&engine.snapshot())?;

    let loaded = store.load()?.expect("snapshot should exist");
    assert_eq!(loaded.chain.len(), 3);
    assert_eq!(loaded.wallets.get("miner"), Some(&2));
    Ok(())
}

#[test]
fn corrupt_snapshot_surfaces_as_error() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    {
        let db = sled::open(temp_dir.path())?;
        db.insert(KEY_SNAPSHOT, &b"not a snapshot"[..])?;
        db.flush()?;
    }
    let store = SledSnapshotStore::open(temp_dir.path())?;
    assert!(store.load().is_err());
    Ok(())
}

#[test]
fn restored_engine_matches_saved_state() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = SledSnapshotStore::open(temp_dir.path())?;
    let engine = mined_engine();
    store.save(&engine.snapshot())?;

    let allocations = [Allocation::new("alice", 100), Allocation::new("bob", 50)];
    let snapshot = store.load()?.expect("snapshot should exist");
    let restored = Engine::restore(1, &allocations, snapshot)?;
    assert_eq!(restored.chain(), engine.chain());
    assert_eq!(restored.balance("alice"), 98);
    assert_eq!(restored.balance("bob"), 52);
    assert_eq!(restored.balance("miner"), 1);
    Ok(())
}
