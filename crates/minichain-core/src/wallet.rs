use std::collections::BTreeMap;

/// Address -> balance map. Balances are derived state: they must always
/// equal a replay of the canonical chain, and only the engine's apply and
/// rebuild paths are allowed to mutate them.
///
/// Backed by a `BTreeMap` so snapshots serialize in a stable order.
#[derive(Clone, Debug, Default)]
pub struct WalletLedger {
    balances: BTreeMap<String, u64>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown addresses read as zero; no entry is created.
    pub fn balance(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, address: &str, amount: u64) {
        *self.balances.entry(address.to_string()).or_insert(0) += amount;
    }

    /// Saturates at zero. Replay of externally accepted blocks is not
    /// balance-checked, so the ledger must never panic on underflow.
    pub fn debit(&mut self, address: &str, amount: u64) {
        let entry = self.balances.entry(address.to_string()).or_insert(0);
        *entry = entry.saturating_sub(amount);
    }

    pub fn set_balance(&mut self, address: &str, amount: u64) {
        self.balances.insert(address.to_string(), amount);
    }

    /// Independent deep copy; mutating it never affects the ledger.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.balances.clone()
    }

    /// Atomically replaces every entry. Used on startup restore and after
    /// a chain replacement rebuild.
    pub fn load_snapshot(&mut self, balances: BTreeMap<String, u64>) {
        self.balances = balances;
    }
}
