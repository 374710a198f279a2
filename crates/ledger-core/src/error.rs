use thiserror::Error;

/// Reasons a candidate chain fails validation. Indices are block positions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("chain is empty")]
    EmptyChain,
    #[error("genesis block is malformed")]
    MalformedGenesis,
    #[error("block at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: u64 },
    #[error("block {index} has no hash")]
    MissingHash { index: u64 },
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: u64 },
    #[error("block {index} hash does not match its content or difficulty")]
    InvalidProof { index: u64 },
}

/// Failure of the transport-level chain fetch for a single peer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("difficulty {difficulty} exceeds the {max} hex characters of a hash")]
    UnreachableDifficulty { difficulty: u32, max: usize },
    #[error("invalid peer address: {0:?}")]
    InvalidPeer(String),
    #[error("block {index} does not extend the tip: expected index {expected_index}, previous hash {expected_previous}")]
    InvalidBlockLinkage {
        index: u64,
        expected_index: u64,
        expected_previous: String,
    },
    #[error("block {index} fails proof-of-work at difficulty {difficulty}")]
    InvalidProof { index: u64, difficulty: u32 },
    #[error("no proof found within {attempts} attempts")]
    ProofNotFound { attempts: u64 },
    #[error("mining cancelled")]
    MiningCancelled,
    #[error("mining worker failed: {0}")]
    MiningWorker(String),
    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },
    #[error("peer {peer} timed out")]
    PeerTimeout { peer: String },
    #[error("chain from {peer} rejected: {reason}")]
    ChainRejected {
        peer: String,
        #[source]
        reason: ValidationError,
    },
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
