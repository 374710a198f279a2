//! The chain authority: owns the canonical chain, the mempool and the peer
//! set, and runs mining and longest-valid-chain consensus over them.

use crate::{
    config::LedgerConfig,
    constants::MIN_PEERS_FOR_CONSENSUS,
    error::{FetchError, LedgerError, Result},
    mempool::Mempool,
    mine::{proof_of_work, CancelToken, MiningOptions},
    peer::Peer,
    unix_now,
    validate::{is_valid_proof, validate_chain},
    Block, Receipt, Transaction,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};
use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

/// Transport used by consensus to obtain a peer's advertised chain.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch_chain(&self, peer: &Peer) -> Result<Vec<Block>, FetchError>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MempoolState {
    pub timestamp: u64,
    pub size: usize,
    pub pending_transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    pub chain: Vec<Block>,
    pub consensus: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkState {
    pub timestamp: u64,
    pub difficulty: u32,
    pub num_pending_txs: usize,
    pub chain_height: usize,
    pub latest_block: Option<Block>,
    pub num_peers: usize,
}

pub struct Ledger {
    config: LedgerConfig,
    chain: RwLock<Vec<Block>>,
    mempool: Mempool,
    peers: RwLock<BTreeSet<Peer>>,
    /// Held for the whole of a mining run so at most one is in flight.
    mining: tokio::sync::Mutex<()>,
    active_mining: Mutex<Option<CancelToken>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        let genesis = Block::genesis();
        info!(
            "ledger initialised at difficulty {}, genesis {}",
            config.difficulty,
            genesis.hash().map(hex::encode).unwrap_or_default()
        );
        Self {
            config,
            chain: RwLock::new(vec![genesis]),
            mempool: Mempool::new(),
            peers: RwLock::new(BTreeSet::new()),
            mining: tokio::sync::Mutex::new(()),
            active_mining: Mutex::new(None),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    pub fn submit_transaction(&self, author: &str, content: &str) -> Result<Receipt> {
        if author.trim().is_empty() {
            return Err(LedgerError::InvalidTransaction("missing author".into()));
        }
        if content.trim().is_empty() {
            return Err(LedgerError::InvalidTransaction("missing content".into()));
        }
        let mut tx = Transaction::new(author, content);
        let receipt = tx.receipt();
        self.mempool.submit(tx);
        debug!("accepted transaction {} from {}", receipt.id, receipt.author);
        Ok(receipt)
    }

    /// Drains the mempool into a block on the current tip, searches for its
    /// proof on a blocking worker and appends it.
    ///
    /// On any failure, including cancellation, the block is discarded and its
    /// transactions go back to the head of the mempool.
    /// The same holds if the returned future is dropped before completion.
    pub async fn mine_block(&self, cancel: CancelToken) -> Result<Block> {
        self.config.validate()?;
        let _serial = self.mining.lock().await;
        *self.active_mining.lock() = Some(cancel.clone());

        let mut block = {
            let chain = self.chain.read();
            let mut block = Block::new(chain.len() as u64, self.mempool.drain_all());
            block.previous_hash = chain.last().and_then(Block::hash);
            block
        };
        let mut pending = PendingBlock {
            ledger: self,
            drained: Some(block.transactions.clone()),
            cancel: cancel.clone(),
        };
        let difficulty = self.config.difficulty;
        let options = MiningOptions {
            max_attempts: self.config.max_attempts,
            cancel,
        };
        debug!(
            "mining block {} with {} transactions",
            block.index,
            block.transactions.len()
        );

        let mined = tokio::task::spawn_blocking(move || {
            proof_of_work(&mut block, difficulty, &options).map(|_| block)
        })
        .await;

        let outcome = match mined {
            Ok(Ok(block)) => self.append_block(block),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(LedgerError::MiningWorker(e.to_string())),
        };
        match outcome {
            Ok(block) => {
                pending.drained = None;
                Ok(block)
            }
            Err(e) => {
                warn!("discarding mined block: {e}");
                Err(e)
            }
        }
    }

    /// Appends a block that must extend the current tip and carry a valid proof.
    pub fn append_block(&self, block: Block) -> Result<Block> {
        let mut chain = self.chain.write();
        let expected_index = chain.len() as u64;
        let tip = chain.last().and_then(Block::hash);
        if block.index != expected_index || tip.is_none() || block.previous_hash != tip {
            return Err(LedgerError::InvalidBlockLinkage {
                index: block.index,
                expected_index,
                expected_previous: tip.map(hex::encode).unwrap_or_default(),
            });
        }
        let proven = block
            .hash()
            .is_some_and(|hash| is_valid_proof(&block, &hash, self.config.difficulty));
        if !proven {
            return Err(LedgerError::InvalidProof {
                index: block.index,
                difficulty: self.config.difficulty,
            });
        }
        info!(
            "appended block {} with nonce {} and hash {}",
            block.index,
            block.nonce,
            block.hash().map(hex::encode).unwrap_or_default()
        );
        chain.push(block.clone());
        Ok(block)
    }

    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.read().clone()
    }

    pub fn height(&self) -> usize {
        self.chain.read().len()
    }

    pub fn get_mempool_state(&self) -> MempoolState {
        let pending_transactions = self.mempool.pending();
        MempoolState {
            timestamp: unix_now(),
            size: pending_transactions.len(),
            pending_transactions,
        }
    }

    /// Registers a peer under its canonical address. Re-registering is a no-op.
    pub fn register_peer(&self, address: &str) -> Result<Peer> {
        let peer = Peer::parse(address)?;
        if self.peers.write().insert(peer.clone()) {
            info!("registered peer {peer}");
        }
        Ok(peer)
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.peers.read().iter().cloned().collect()
    }

    pub fn network_state(&self) -> NetworkState {
        let (chain_height, latest_block) = {
            let chain = self.chain.read();
            (chain.len(), chain.last().cloned())
        };
        NetworkState {
            timestamp: unix_now(),
            difficulty: self.config.difficulty,
            num_pending_txs: self.mempool.size(),
            chain_height,
            latest_block,
            num_peers: self.peers.read().len(),
        }
    }

    /// Longest-valid-chain consensus over the registered peers.
    ///
    /// Peer chains are fetched concurrently, each under the configured
    /// timeout, then judged in peer order. A candidate must be strictly longer
    /// than the best seen so far and fully validate before it is adopted.
    pub async fn run_consensus(&self, fetcher: &Arc<dyn ChainFetcher>) -> ConsensusOutcome {
        let peers = self.peers();
        if peers.len() < MIN_PEERS_FOR_CONSENSUS {
            return ConsensusOutcome {
                chain: self.get_chain(),
                consensus: true,
            };
        }

        let mut best_len = self.height();
        let mut best: Option<(Peer, Vec<Block>)> = None;
        for (peer, fetched) in self.fetch_all(peers, fetcher).await {
            let candidate = match fetched {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!("skipping peer: {e}");
                    continue;
                }
            };
            if candidate.len() <= best_len {
                debug!(
                    "peer {peer} chain of length {} is not longer than {best_len}",
                    candidate.len()
                );
                continue;
            }
            match validate_chain(&candidate, self.config.difficulty) {
                Ok(()) => {
                    best_len = candidate.len();
                    best = Some((peer, candidate));
                }
                Err(reason) => {
                    let rejected = LedgerError::ChainRejected {
                        peer: peer.to_string(),
                        reason,
                    };
                    warn!("{rejected}");
                }
            }
        }

        let consensus = match best {
            Some((peer, candidate)) => self.replace_chain(&peer, candidate),
            None => false,
        };
        ConsensusOutcome {
            chain: self.get_chain(),
            consensus,
        }
    }

    async fn fetch_all(
        &self,
        peers: Vec<Peer>,
        fetcher: &Arc<dyn ChainFetcher>,
    ) -> Vec<(Peer, Result<Vec<Block>>)> {
        let limit = self.config.peer_timeout;
        let mut tasks = JoinSet::new();
        for (slot, peer) in peers.into_iter().enumerate() {
            let fetcher = fetcher.clone();
            tasks.spawn(async move {
                let fetched = match timeout(limit, fetcher.fetch_chain(&peer)).await {
                    Ok(Ok(chain)) => Ok(chain),
                    Ok(Err(e)) => Err(fetch_failure(&peer, e)),
                    Err(_) => Err(LedgerError::PeerTimeout {
                        peer: peer.to_string(),
                    }),
                };
                (slot, peer, fetched)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!("peer fetch task failed: {e}"),
            }
        }
        results.sort_by_key(|(slot, _, _)| *slot);
        results
            .into_iter()
            .map(|(_, peer, fetched)| (peer, fetched))
            .collect()
    }

    /// Swaps in a validated candidate if it is still strictly longer than the
    /// local chain. Transactions only the old chain carried return to the
    /// mempool and any in-flight mining run is cancelled.
    fn replace_chain(&self, peer: &Peer, candidate: Vec<Block>) -> bool {
        let orphaned = {
            let mut chain = self.chain.write();
            if candidate.len() <= chain.len() {
                debug!("local chain grew past the candidate from {peer}");
                return false;
            }
            let adopted: HashSet<_> = candidate
                .iter()
                .flat_map(|b| b.transactions.iter().map(|tx| tx.id))
                .collect();
            let old = std::mem::replace(&mut *chain, candidate);
            info!(
                "adopted chain of length {} from {peer}, replacing length {}",
                chain.len(),
                old.len()
            );
            old.into_iter()
                .flat_map(|b| b.transactions)
                .filter(|tx| !adopted.contains(&tx.id))
                .collect::<Vec<_>>()
        };

        if let Some(token) = self.active_mining.lock().as_ref() {
            token.cancel();
        }
        if !orphaned.is_empty() {
            debug!("returning {} orphaned transactions to the mempool", orphaned.len());
            self.mempool.requeue_front(orphaned);
        }
        true
    }
}

fn fetch_failure(peer: &Peer, e: FetchError) -> LedgerError {
    match e {
        FetchError::Timeout(_) => LedgerError::PeerTimeout {
            peer: peer.to_string(),
        },
        other => LedgerError::PeerUnreachable {
            peer: peer.to_string(),
            reason: other.to_string(),
        },
    }
}

/// A mining run in progress. Unless disarmed by clearing `drained`, dropping
/// it cancels the search and hands the drained transactions back.
struct PendingBlock<'a> {
    ledger: &'a Ledger,
    drained: Option<Vec<Transaction>>,
    cancel: CancelToken,
}

impl Drop for PendingBlock<'_> {
    fn drop(&mut self) {
        *self.ledger.active_mining.lock() = None;
        if let Some(txs) = self.drained.take() {
            self.cancel.cancel();
            self.ledger.mempool.requeue_front(txs);
        }
    }
}
