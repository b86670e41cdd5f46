use thiserror::Error;

/// Why a submitted transaction was turned away. The mempool is left
/// untouched in every case.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TxRejection {
    #[error("transaction has an empty from/to address")]
    EmptyAddress,
    #[error("transaction amount must be greater than zero")]
    NonPositiveAmount,
    #[error("insufficient funds for {address}: {available} available, {required} required")]
    InsufficientFunds {
        address: String,
        available: u64,
        required: u64,
    },
}

/// Why a candidate chain failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChainRejected {
    #[error("genesis block does not match the expected genesis")]
    BadGenesis,
    #[error("block {index} hash does not match its content")]
    BadHash { index: u64 },
    #[error("block {index} does not link to its predecessor")]
    BadLink { index: u64 },
    #[error("block {index} hash does not meet difficulty {difficulty}")]
    BadDifficulty { index: u64, difficulty: usize },
}

/// A persisted snapshot that cannot seed a consistent engine. Fatal at
/// startup: the node refuses to run on guessed state.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("persisted snapshot has an empty chain")]
    EmptyChain,
    #[error("persisted chain failed validation: {0}")]
    InvalidChain(#[from] ChainRejected),
}
