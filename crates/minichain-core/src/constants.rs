/// Sender address used for minting transactions (genesis allocations and
/// mining rewards). Never debited.
pub const SYSTEM_ADDRESS: &str = "system";

/// Amount credited to the miner for each mined block.
pub const MINING_REWARD: u64 = 1;

/// Fixed genesis timestamp so every node derives an identical genesis hash.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
