pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mempool;
pub mod mine;
pub mod peer;
pub mod validate;

pub use config::LedgerConfig;
pub use error::{FetchError, LedgerError, ValidationError};
pub use ledger::{ChainFetcher, ConsensusOutcome, Ledger, MempoolState, NetworkState};
pub use mempool::Mempool;
pub use mine::{CancelToken, MiningOptions};
pub use peer::Peer;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type Hash = [u8; 32];

/// Byte offset of the little-endian nonce inside [`Block::preimage`].
pub const NONCE_OFFSET: usize = 8;

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_opt_hash(buf: &mut Vec<u8>, hash: &Option<Hash>) {
    match hash {
        Some(h) => {
            buf.push(1);
            buf.extend_from_slice(h);
        }
        None => buf.push(0),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub timestamp: u64,
    pub author: String,
    pub content: String,
    #[serde(default, with = "hex_hash::option")]
    hash: Option<Hash>,
}

impl Transaction {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: unix_now(),
            author: author.into(),
            content: content.into(),
            hash: None,
        }
    }

    /// Digest of every field except `hash`, in sorted field order.
    pub fn digest(&self) -> Hash {
        let mut bytes = Vec::with_capacity(64 + self.author.len() + self.content.len());
        put_str(&mut bytes, &self.author);
        put_str(&mut bytes, &self.content);
        bytes.extend_from_slice(self.id.as_bytes());
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        sha256(&bytes)
    }

    /// Stores the digest and returns a snapshot carrying it.
    pub fn receipt(&mut self) -> Receipt {
        let hash = self.digest();
        self.hash = Some(hash);
        Receipt {
            id: self.id,
            timestamp: self.timestamp,
            author: self.author.clone(),
            content: self.content.clone(),
            hash,
        }
    }

    pub fn hash(&self) -> Option<Hash> {
        self.hash
    }

    fn write_canonical(&self, buf: &mut Vec<u8>) {
        put_str(buf, &self.author);
        put_str(buf, &self.content);
        put_opt_hash(buf, &self.hash);
        buf.extend_from_slice(self.id.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub timestamp: u64,
    pub author: String,
    pub content: String,
    #[serde(with = "hex_hash")]
    pub hash: Hash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: u64,
    /// `None` only for the genesis block.
    #[serde(with = "hex_hash::option")]
    pub previous_hash: Option<Hash>,
    pub nonce: u64,
    #[serde(default, with = "hex_hash::option")]
    hash: Option<Hash>,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            transactions,
            timestamp: unix_now(),
            previous_hash: None,
            nonce: 0,
            hash: None,
        }
    }

    pub fn genesis() -> Self {
        let mut genesis = Block::new(0, vec![]);
        genesis.generate_hash();
        genesis
    }

    /// Canonical bytes of every field but `hash`, in sorted field order:
    /// index, nonce, previous_hash, timestamp, transactions.
    pub fn preimage(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(64 + self.transactions.len() * 128);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        put_opt_hash(&mut bytes, &self.previous_hash);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            tx.write_canonical(&mut bytes);
        }
        bytes
    }

    /// Hash of the current content, without storing it.
    pub fn compute_hash(&self) -> Hash {
        sha256(&self.preimage())
    }

    /// Recomputes and stores the hash. Must be called again after any nonce change.
    pub fn generate_hash(&mut self) -> Hash {
        let hash = self.compute_hash();
        self.hash = Some(hash);
        hash
    }

    pub fn hash(&self) -> Option<Hash> {
        self.hash
    }
}

/// Serde adapters rendering hashes as lowercase hex.
pub mod hex_hash {
    use super::Hash;
    use crate::constants::HASH_SIZE;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(d)?;
        parse(&s).map_err(D::Error::custom)
    }

    pub fn parse(s: &str) -> Result<Hash, String> {
        let mut out = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut out).map_err(|e| format!("invalid hash {s:?}: {e}"))?;
        Ok(out)
    }

    pub mod option {
        use super::Hash;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(hash: &Option<Hash>, s: S) -> Result<S::Ok, S::Error> {
            match hash {
                Some(h) => s.serialize_some(&hex::encode(h)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Hash>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| super::parse(&s).map_err(D::Error::custom))
                .transpose()
        }
    }
}
