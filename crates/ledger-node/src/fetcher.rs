use crate::{constants::CHAIN_PATH, routes::ChainResponse};
use async_trait::async_trait;
use ledger_core::{Block, ChainFetcher, FetchError, Peer};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches a peer's chain from its `/chain` endpoint.
#[derive(Clone)]
pub struct HttpChainFetcher {
    http: Client,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &Peer) -> Result<Vec<Block>, FetchError> {
        let url = format!("{}{CHAIN_PATH}", peer.address());
        debug!("fetching chain from {url}");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| transport_error(e, FetchError::Unreachable))?;
        let body = response
            .json::<ChainResponse>()
            .await
            .map_err(|e| transport_error(e, FetchError::Malformed))?;
        Ok(body.chain)
    }
}

fn transport_error(e: reqwest::Error, otherwise: fn(String) -> FetchError) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        otherwise(e.to_string())
    }
}
