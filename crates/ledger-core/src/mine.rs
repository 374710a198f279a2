use crate::{
    constants::NONCE_WINDOW,
    error::{LedgerError, Result},
    sha256, Block, Hash, NONCE_OFFSET,
};
use rayon::prelude::*;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::debug;

/// Shared flag that aborts an in-flight proof-of-work search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MiningOptions {
    pub max_attempts: Option<u64>,
    pub cancel: CancelToken,
}

pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b >> 4 == 0 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// True when the hex rendering of `hash` starts with `difficulty` zeros.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    count_leading_zero_nibbles(hash) >= difficulty
}

fn hash_at(base: &[u8], nonce: u64) -> Hash {
    let mut buf = base.to_vec();
    buf[NONCE_OFFSET..NONCE_OFFSET + 8].copy_from_slice(&nonce.to_le_bytes());
    sha256(&buf)
}

/// Searches nonces upward from `block.nonce` until the block hash meets
/// `difficulty`, then stores the winning nonce and hash on the block.
///
/// Each window of nonces is scanned in parallel but resolved with
/// `find_first`, so the smallest winning nonce is always the one returned.
/// The cancel token is polled between windows.
pub fn proof_of_work(block: &mut Block, difficulty: u32, options: &MiningOptions) -> Result<Hash> {
    let base = block.preimage();
    let limit = options.max_attempts.unwrap_or(u64::MAX);
    let mut start = block.nonce;
    let mut tried = 0u64;

    while tried < limit {
        if options.cancel.is_cancelled() {
            debug!("proof-of-work for block {} cancelled", block.index);
            return Err(LedgerError::MiningCancelled);
        }
        let end = start.saturating_add(NONCE_WINDOW.min(limit - tried));
        if end == start {
            break;
        }
        let found = (start..end)
            .into_par_iter()
            .find_first(|nonce| meets_difficulty(&hash_at(&base, *nonce), difficulty));

        if let Some(nonce) = found {
            block.nonce = nonce;
            let hash = block.generate_hash();
            debug!(
                "proof found for block {} at nonce {} after {} attempts",
                block.index,
                nonce,
                tried + (nonce - start) + 1
            );
            return Ok(hash);
        }
        tried += end - start;
        start = end;
    }

    Err(LedgerError::ProofNotFound { attempts: tried })
}
