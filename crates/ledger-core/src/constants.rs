pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// Nonces scanned per parallel window before the cancel flag is polled again.
pub const NONCE_WINDOW: u64 = 4_096;
/// Leading zero hex characters required when no difficulty is configured.
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 5_000;
/// Below this many known peers consensus trusts the local chain as-is.
pub const MIN_PEERS_FOR_CONSENSUS: usize = 2;
