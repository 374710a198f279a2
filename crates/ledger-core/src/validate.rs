use crate::{error::ValidationError, mine::meets_difficulty, Block, Hash};

/// `claimed` meets the difficulty and is exactly the block's hash at its stored nonce.
pub fn is_valid_proof(block: &Block, claimed: &Hash, difficulty: u32) -> bool {
    meets_difficulty(claimed, difficulty) && block.compute_hash() == *claimed
}

/// Walks `chain` from genesis and stops at the first defect. Never mutates the input.
pub fn validate_chain(chain: &[Block], difficulty: u32) -> Result<(), ValidationError> {
    let genesis = chain.first().ok_or(ValidationError::EmptyChain)?;
    let genesis_hash = genesis.hash().ok_or(ValidationError::MissingHash { index: 0 })?;
    if genesis.index != 0
        || !genesis.transactions.is_empty()
        || genesis.previous_hash.is_some()
        || genesis.compute_hash() != genesis_hash
    {
        return Err(ValidationError::MalformedGenesis);
    }

    let mut previous = genesis_hash;
    for (position, block) in chain.iter().enumerate().skip(1) {
        if block.index != position as u64 {
            return Err(ValidationError::IndexMismatch {
                position,
                index: block.index,
            });
        }
        let hash = block
            .hash()
            .ok_or(ValidationError::MissingHash { index: block.index })?;
        if block.previous_hash != Some(previous) {
            return Err(ValidationError::BrokenLink { index: block.index });
        }
        if !is_valid_proof(block, &hash, difficulty) {
            return Err(ValidationError::InvalidProof { index: block.index });
        }
        previous = hash;
    }
    Ok(())
}

pub fn check_chain_validity(chain: &[Block], difficulty: u32) -> bool {
    validate_chain(chain, difficulty).is_ok()
}
