use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::SYSTEM_ADDRESS;

/// Immutable transfer of `amount` from `from` to `to`. A `from` of
/// [`SYSTEM_ADDRESS`] mints new balance and is never debited.
///
/// Value equality (all three fields) is what the engine uses to prune
/// finalized transactions out of the mempool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    /// A minting transaction from the system address.
    pub fn mint(to: impl Into<String>, amount: u64) -> Self {
        Self::new(SYSTEM_ADDRESS, to, amount)
    }

    pub fn is_mint(&self) -> bool {
        self.from == SYSTEM_ADDRESS
    }
}

/// One link of the chain. `hash` is derived from the other five fields
/// and carried alongside them on the wire so receivers can verify it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,
    #[serde(rename = "previousHash")]
    pub previous_hash: String,
    pub hash: String,
}

/// Canonical digest pre-image: exactly these fields, in this order,
/// compact JSON. `hash` is never part of the pre-image. Any change here
/// is a consensus-breaking change.
#[derive(Serialize)]
struct DigestInput<'a> {
    index: u64,
    timestamp: u64,
    transactions: &'a [Transaction],
    nonce: u64,
    #[serde(rename = "previousHash")]
    previous_hash: &'a str,
}

impl Block {
    /// Builds a block with `nonce = 0` and its hash already computed.
    pub fn new(
        index: u64,
        timestamp: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            nonce: 0,
            previous_hash,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// SHA-256 of the canonical pre-image, as 64 lower-case hex chars.
    /// Pure and deterministic: identical logical content always yields an
    /// identical digest, on every node.
    pub fn compute_hash(&self) -> String {
        let input = DigestInput {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
        };
        let bytes = serde_json::to_vec(&input).expect("digest pre-image serializes");
        hex::encode(Sha256::digest(&bytes))
    }
}

/// True when `hash` starts with at least `difficulty` zero hex chars.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    fn sample_block() -> Block {
        Block::new(
            1,
            1_600_000_200,
            vec![
                Transaction::new("alice", "bob", 10),
                Transaction::new("bob", "carol", 5),
            ],
            "0".repeat(64),
        )
    }

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let block = sample_block();
        assert_eq!(block.hash.len(), HASH_HEX_SIZE);
        assert!(block
            .hash
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn digest_known_answer() {
        let block = sample_block();
        let expected_hex = "68520e2771153a5c92208defd74e0d8b8a385873a109d3c0337b9c1aac227e5a";
        assert_eq!(block.hash, expected_hex);
    }

    #[test]
    fn digest_is_deterministic() {
        let block = sample_block();
        assert_eq!(block.compute_hash(), block.compute_hash());
    }

    #[test]
    fn digest_ignores_stored_hash_field() {
        let mut block = sample_block();
        let original = block.compute_hash();
        block.hash = "f".repeat(64);
        assert_eq!(block.compute_hash(), original);
    }

    #[test]
    fn digest_changes_with_nonce() {
        let mut block = sample_block();
        let before = block.compute_hash();
        block.nonce += 1;
        assert_ne!(block.compute_hash(), before);
    }

    #[test]
    fn digest_changes_with_transaction_order() {
        let mut block = sample_block();
        let before = block.compute_hash();
        block.transactions.reverse();
        assert_ne!(block.compute_hash(), before);
    }

    #[test]
    fn wire_format_uses_canonical_field_names() {
        let block = sample_block();
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.starts_with(r#"{"index":1,"timestamp":1600000200,"transactions":"#));
        assert!(json.contains(r#""previousHash":"#));
        assert!(json.contains(r#""hash":"#));
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn transaction_value_equality() {
        let tx1 = Transaction::new("alice", "bob", 10);
        let tx2 = Transaction::new("alice", "bob", 10);
        let tx3 = Transaction::new("alice", "carol", 10);
        assert_eq!(tx1, tx2);
        assert_ne!(tx1, tx3);
    }

    #[test]
    fn mint_comes_from_system() {
        let tx = Transaction::mint("miner", 1);
        assert!(tx.is_mint());
        assert!(!Transaction::new("alice", "bob", 1).is_mint());
    }

    #[test]
    fn meets_difficulty_examples() {
        assert!(meets_difficulty("00ab", 2));
        assert!(meets_difficulty("0abc", 1));
        assert!(!meets_difficulty("0abc", 2));
        assert!(meets_difficulty("abcd", 0));
        assert!(!meets_difficulty("0", 2));
    }
}
