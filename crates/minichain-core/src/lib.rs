//! Chain, mempool, wallet and consensus logic for a single minichain
//! node: proof-of-work mining, block and chain validation, longest-chain
//! conflict resolution, and deterministic balance replay. Pure library,
//! no I/O; persistence and peer traffic live in the node crate.

pub mod block;
pub mod constants;
pub mod engine;
pub mod error;
pub mod wallet;

pub use block::{meets_difficulty, Block, Transaction};
pub use engine::{create_genesis, mine_candidate, validate_chain, Allocation, Engine, StateSnapshot};
pub use error::{ChainRejected, RestoreError, TxRejection};
pub use wallet::WalletLedger;
