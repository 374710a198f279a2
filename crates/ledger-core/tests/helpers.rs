#![allow(dead_code)]

use async_trait::async_trait;
use ledger_core::{Block, CancelToken, ChainFetcher, FetchError, Ledger, LedgerConfig, Peer};
use std::{collections::HashMap, sync::Arc, time::Duration};

pub const DIFFICULTY: u32 = 2;

pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: DIFFICULTY,
        max_attempts: None,
        peer_timeout: Duration::from_millis(200),
    }
}

pub fn test_ledger() -> Ledger {
    Ledger::new(test_config())
}

/// A chain of `len` blocks (genesis included) mined by a throwaway ledger.
pub async fn mined_chain(len: usize) -> Vec<Block> {
    let ledger = test_ledger();
    for i in 1..len {
        ledger
            .submit_transaction(&format!("remote-{i}"), &format!("payload {i}"))
            .expect("submit");
        ledger.mine_block(CancelToken::new()).await.expect("mine");
    }
    ledger.get_chain()
}

pub enum Behaviour {
    Serve(Vec<Block>),
    Unreachable,
    Hang,
}

#[derive(Default)]
pub struct MockFetcher {
    peers: HashMap<Peer, Behaviour>,
}

impl MockFetcher {
    pub fn with(mut self, address: &str, behaviour: Behaviour) -> Self {
        let peer = Peer::parse(address).expect("peer address");
        self.peers.insert(peer, behaviour);
        self
    }

    pub fn register_all(&self, ledger: &Ledger) {
        for peer in self.peers.keys() {
            ledger.register_peer(peer.address()).expect("register");
        }
    }

    pub fn shared(self) -> Arc<dyn ChainFetcher> {
        Arc::new(self)
    }
}

#[async_trait]
impl ChainFetcher for MockFetcher {
    async fn fetch_chain(&self, peer: &Peer) -> Result<Vec<Block>, FetchError> {
        match self.peers.get(peer) {
            Some(Behaviour::Serve(chain)) => Ok(chain.clone()),
            Some(Behaviour::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(FetchError::Unreachable(peer.to_string()))
            }
            Some(Behaviour::Unreachable) | None => {
                Err(FetchError::Unreachable(format!("connection refused: {peer}")))
            }
        }
    }
}
