use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::block::{meets_difficulty, Block, Transaction};
use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP, MINING_REWARD};
use crate::error::{ChainRejected, RestoreError, TxRejection};
use crate::wallet::WalletLedger;

/// Typed genesis allocation, resolved at the configuration boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Allocation {
    pub address: String,
    pub amount: u64,
}

impl Allocation {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

/// Persisted mirror of engine state. A cache, not a source of truth: the
/// engine can always reconstruct `wallets` from `chain` alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub chain: Vec<Block>,
    pub wallets: BTreeMap<String, u64>,
}

/// The genesis block for a set of allocations: one minting transaction per
/// allocation, the fixed timestamp, `nonce = 0`, no PoW requirement.
pub fn create_genesis(allocations: &[Allocation]) -> Block {
    let transactions = allocations
        .iter()
        .map(|a| Transaction::mint(a.address.clone(), a.amount))
        .collect();
    Block::new(
        0,
        GENESIS_TIMESTAMP,
        transactions,
        GENESIS_PREVIOUS_HASH.to_string(),
    )
}

/// Checks a candidate chain: genesis identity, then per block the stored
/// hash against its content, the link to its predecessor, and the
/// difficulty target. Genesis itself is exempt from PoW.
pub fn validate_chain(
    candidate: &[Block],
    expected_genesis: &Block,
    difficulty: usize,
) -> Result<(), ChainRejected> {
    // Full field comparison, not just the hash string: a forged genesis
    // carrying the honest hash alongside tampered content must not pass.
    match candidate.first() {
        Some(genesis) if genesis == expected_genesis => {}
        _ => return Err(ChainRejected::BadGenesis),
    }
    for pair in candidate.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.hash != block.compute_hash() {
            return Err(ChainRejected::BadHash { index: block.index });
        }
        if block.previous_hash != prev.hash {
            return Err(ChainRejected::BadLink { index: block.index });
        }
        if !meets_difficulty(&block.hash, difficulty) {
            return Err(ChainRejected::BadDifficulty {
                index: block.index,
                difficulty,
            });
        }
    }
    Ok(())
}

/// Owns the canonical chain and the mempool, and drives every wallet
/// mutation. Mutating operations take `&mut self`; callers serialize them
/// (single-writer discipline), reads can share the engine freely.
#[derive(Debug)]
pub struct Engine {
    chain: Vec<Block>,
    mempool: Vec<Transaction>,
    difficulty: usize,
    wallets: WalletLedger,
}

impl Engine {
    /// Fresh engine: synthesizes the genesis block from `allocations` and
    /// replays it into the wallet ledger.
    pub fn new(difficulty: usize, allocations: &[Allocation]) -> Self {
        let mut engine = Self {
            chain: vec![create_genesis(allocations)],
            mempool: Vec::new(),
            difficulty,
            wallets: WalletLedger::new(),
        };
        engine.rebuild_wallets();
        engine
    }

    /// Restores from a persisted snapshot. The chain must validate against
    /// the genesis derived from `allocations`; anything else is fatal.
    /// Wallets are rebuilt from the chain, the snapshot's wallet map is
    /// only a mirror.
    pub fn restore(
        difficulty: usize,
        allocations: &[Allocation],
        snapshot: StateSnapshot,
    ) -> Result<Self, RestoreError> {
        if snapshot.chain.is_empty() {
            return Err(RestoreError::EmptyChain);
        }
        let expected = create_genesis(allocations);
        validate_chain(&snapshot.chain, &expected, difficulty)?;
        let mut engine = Self {
            chain: snapshot.chain,
            mempool: Vec::new(),
            difficulty,
            wallets: WalletLedger::new(),
        };
        engine.rebuild_wallets();
        info!(height = engine.chain.len(), "restored engine from snapshot");
        Ok(engine)
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain is never empty")
    }

    pub fn mempool(&self) -> &[Transaction] {
        &self.mempool
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.wallets.balance(address)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            chain: self.chain.clone(),
            wallets: self.wallets.snapshot(),
        }
    }

    /// Queues a transaction after validating it against confirmed balances
    /// minus what the sender already has pending in the mempool, so a
    /// sender cannot overspend across queued transactions.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), TxRejection> {
        if tx.from.is_empty() || tx.to.is_empty() {
            return Err(TxRejection::EmptyAddress);
        }
        if tx.amount == 0 {
            return Err(TxRejection::NonPositiveAmount);
        }
        let pending: u64 = self
            .mempool
            .iter()
            .filter(|queued| queued.from == tx.from)
            .map(|queued| queued.amount)
            .sum();
        let available = self.wallets.balance(&tx.from).saturating_sub(pending);
        if available < tx.amount {
            return Err(TxRejection::InsufficientFunds {
                address: tx.from,
                available,
                required: tx.amount,
            });
        }
        debug!(from = %tx.from, to = %tx.to, amount = tx.amount, "transaction queued");
        self.mempool.push(tx);
        Ok(())
    }

    /// Mines the mempool plus a reward transaction into the next block.
    /// The nonce search is unbounded; use [`Engine::mine_block_cancellable`]
    /// when a timeout or a competing tip update must be able to abandon it.
    pub fn mine_block(&mut self, miner: &str) -> Block {
        let never = AtomicBool::new(false);
        self.mine_block_cancellable(miner, &never)
            .expect("mining without a cancel signal always completes")
    }

    /// Like [`Engine::mine_block`], with a cancellation check on every
    /// nonce. Returns `None` if `cancel` was raised; chain, mempool and
    /// wallets are then untouched.
    pub fn mine_block_cancellable(&mut self, miner: &str, cancel: &AtomicBool) -> Option<Block> {
        let candidate = self.candidate_block(miner);
        let block = mine_candidate(candidate, self.difficulty, cancel)?;
        info!(index = block.index, nonce = block.nonce, hash = %block.hash, "mined block");

        // Append, apply, clear: one atomic unit under the &mut borrow.
        self.chain.push(block.clone());
        apply_block(&mut self.wallets, &block);
        self.mempool.clear();
        Some(block)
    }

    /// Next-block candidate for the current tip and mempool: the queued
    /// transactions plus the miner reward, `nonce = 0`, not yet mined.
    /// Mutates nothing, so a caller can run the PoW search on the result
    /// without holding the engine and commit the mined block afterwards
    /// through [`Engine::accept_external_block`], which re-checks the tip.
    pub fn candidate_block(&self, miner: &str) -> Block {
        let mut transactions = self.mempool.clone();
        transactions.push(Transaction::mint(miner, MINING_REWARD));
        let tip = self.tip();
        Block::new(tip.index + 1, unix_now(), transactions, tip.hash.clone())
    }

    /// Adopts a strictly longer valid chain, then rebuilds wallets from
    /// it. Equal-length candidates never win (length-only fork choice).
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            debug!(
                ours = self.chain.len(),
                theirs = candidate.len(),
                "candidate chain is not longer, keeping ours"
            );
            return false;
        }
        if let Err(reason) = validate_chain(&candidate, &self.chain[0], self.difficulty) {
            debug!(%reason, "candidate chain rejected");
            return false;
        }
        self.chain = candidate;
        self.rebuild_wallets();
        info!(height = self.chain.len(), tip = %self.tip().hash, "adopted longer chain");
        true
    }

    /// Appends a peer-announced block if it extends the tip, its hash
    /// matches its content, and it meets difficulty. Finalized
    /// transactions are pruned from the mempool by value equality. On
    /// rejection nothing changes.
    pub fn accept_external_block(&mut self, block: Block) -> bool {
        let tip = self.tip();
        if block.previous_hash != tip.hash {
            debug!(index = block.index, "announced block does not extend our tip");
            return false;
        }
        if block.hash != block.compute_hash() {
            debug!(index = block.index, "announced block hash does not match content");
            return false;
        }
        if !meets_difficulty(&block.hash, self.difficulty) {
            debug!(index = block.index, "announced block does not meet difficulty");
            return false;
        }
        self.mempool
            .retain(|queued| !block.transactions.contains(queued));
        apply_block(&mut self.wallets, &block);
        info!(index = block.index, hash = %block.hash, "accepted announced block");
        self.chain.push(block);
        true
    }

    /// Replays the whole chain into a fresh balance map and installs it
    /// atomically. Idempotent: the chain is the single source of truth.
    pub fn rebuild_wallets(&mut self) {
        let mut balances: BTreeMap<String, u64> = BTreeMap::new();
        for block in &self.chain {
            for tx in &block.transactions {
                if !tx.is_mint() {
                    let from = balances.entry(tx.from.clone()).or_insert(0);
                    *from = from.saturating_sub(tx.amount);
                }
                *balances.entry(tx.to.clone()).or_insert(0) += tx.amount;
            }
        }
        self.wallets.load_snapshot(balances);
    }
}

/// Sequential PoW search over `block`'s nonce, with a cancellation check
/// per iteration. Returns `None` if `cancel` was raised before a nonce
/// satisfied `difficulty`.
pub fn mine_candidate(mut block: Block, difficulty: usize, cancel: &AtomicBool) -> Option<Block> {
    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!(index = block.index, nonce = block.nonce, "mining cancelled");
            return None;
        }
        if meets_difficulty(&block.hash, difficulty) {
            return Some(block);
        }
        block.nonce += 1;
        block.hash = block.compute_hash();
    }
}

/// Debit/credit rule shared by mining, block acceptance and replay: the
/// system address is never debited.
fn apply_block(wallets: &mut WalletLedger, block: &Block) {
    for tx in &block.transactions {
        if !tx.is_mint() {
            wallets.debit(&tx.from, tx.amount);
        }
        wallets.credit(&tx.to, tx.amount);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}
