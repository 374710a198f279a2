use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{
    Block, CancelToken, ChainFetcher, ConsensusOutcome, Ledger, LedgerError, MempoolState,
    NetworkState, Peer, Receipt,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub fetcher: Arc<dyn ChainFetcher>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainResponse {
    pub length: usize,
    pub difficulty: u32,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
struct MainChain {
    chain: Vec<Block>,
}

#[derive(Deserialize)]
struct TxIn {
    #[serde(default)]
    author: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct TxAccepted {
    receipt: Receipt,
}

#[derive(Serialize)]
struct BlockOut {
    block: Block,
}

#[derive(Deserialize)]
struct PeerIn {
    address: String,
}

#[derive(Serialize)]
struct PeerOut {
    peer: Peer,
}

#[derive(Serialize)]
struct PeerList {
    peers: Vec<Peer>,
}

pub struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::InvalidTransaction(_) | LedgerError::InvalidPeer(_) => {
                StatusCode::BAD_REQUEST
            }
            LedgerError::InvalidBlockLinkage { .. }
            | LedgerError::InvalidProof { .. }
            | LedgerError::MiningCancelled => StatusCode::CONFLICT,
            LedgerError::ProofNotFound { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::PeerUnreachable { .. }
            | LedgerError::PeerTimeout { .. }
            | LedgerError::ChainRejected { .. } => StatusCode::BAD_GATEWAY,
            LedgerError::UnreachableDifficulty { .. } | LedgerError::MiningWorker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/chain", get(chain))
        .route("/mainchain", get(main_chain))
        .route("/consensus", get(consensus))
        .route("/tx", post(submit_tx))
        .route("/mempool", get(mempool))
        .route("/mine", post(mine))
        .route("/blocks", post(append_block))
        .route("/peers", get(peers).post(register_peer))
        .route("/state", get(network_state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chain(State(state): State<AppState>) -> Json<ChainResponse> {
    let chain = state.ledger.get_chain();
    Json(ChainResponse {
        length: chain.len(),
        difficulty: state.ledger.difficulty(),
        chain,
    })
}

async fn main_chain(State(state): State<AppState>) -> Json<MainChain> {
    let outcome = state.ledger.run_consensus(&state.fetcher).await;
    Json(MainChain {
        chain: outcome.chain,
    })
}

async fn consensus(State(state): State<AppState>) -> Json<ConsensusOutcome> {
    Json(state.ledger.run_consensus(&state.fetcher).await)
}

async fn submit_tx(
    State(state): State<AppState>,
    Json(tx): Json<TxIn>,
) -> Result<Json<TxAccepted>, ApiError> {
    let receipt = state.ledger.submit_transaction(&tx.author, &tx.content)?;
    Ok(Json(TxAccepted { receipt }))
}

async fn mempool(State(state): State<AppState>) -> Json<MempoolState> {
    Json(state.ledger.get_mempool_state())
}

async fn mine(State(state): State<AppState>) -> Result<Json<BlockOut>, ApiError> {
    // Detached so a client disconnect does not abort a search that is nearly done.
    let ledger = state.ledger.clone();
    let block = tokio::spawn(async move { ledger.mine_block(CancelToken::new()).await })
        .await
        .map_err(|e| LedgerError::MiningWorker(e.to_string()))??;
    Ok(Json(BlockOut { block }))
}

async fn append_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Result<Json<BlockOut>, ApiError> {
    let block = state.ledger.append_block(block)?;
    Ok(Json(BlockOut { block }))
}

async fn peers(State(state): State<AppState>) -> Json<PeerList> {
    Json(PeerList {
        peers: state.ledger.peers(),
    })
}

async fn register_peer(
    State(state): State<AppState>,
    Json(peer): Json<PeerIn>,
) -> Result<Json<PeerOut>, ApiError> {
    let peer = state.ledger.register_peer(&peer.address)?;
    Ok(Json(PeerOut { peer }))
}

async fn network_state(State(state): State<AppState>) -> Json<NetworkState> {
    Json(state.ledger.network_state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::HttpChainFetcher;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request},
    };
    use ledger_core::LedgerConfig;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = LedgerConfig {
            difficulty: 2,
            max_attempts: None,
            peer_timeout: Duration::from_millis(500),
        };
        AppState {
            ledger: Arc::new(Ledger::new(config)),
            fetcher: Arc::new(HttpChainFetcher::new(Duration::from_millis(500)).unwrap()),
        }
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_check() {
        let app = router(test_state());
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn submit_then_mine_flow() {
        let app = router(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/tx",
            Some(json!({ "author": "alice", "content": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receipt"]["author"], "alice");
        assert_eq!(body["receipt"]["hash"].as_str().unwrap().len(), 64);

        let (_, body) = call(&app, Method::GET, "/mempool", None).await;
        assert_eq!(body["size"], 1);

        let (status, body) = call(&app, Method::POST, "/mine", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["block"]["index"], 1);
        assert!(body["block"]["hash"].as_str().unwrap().starts_with("00"));
        assert_eq!(body["block"]["transactions"][0]["content"], "hello");

        let (_, body) = call(&app, Method::GET, "/chain", None).await;
        assert_eq!(body["length"], 2);
        assert!(body["chain"][0]["previous_hash"].is_null());
    }

    #[tokio::test]
    async fn missing_author_is_bad_request() {
        let app = router(test_state());
        let (status, body) = call(&app, Method::POST, "/tx", Some(json!({ "content": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("author"));
    }

    #[tokio::test]
    async fn stale_block_is_conflict() {
        let state = test_state();
        let app = router(state.clone());
        let mut block = Block::new(5, vec![]);
        block.generate_hash();
        let (status, _) = call(
            &app,
            Method::POST,
            "/blocks",
            Some(serde_json::to_value(&block).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(state.ledger.height(), 1);
    }

    #[tokio::test]
    async fn peers_register_and_list() {
        let app = router(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/peers",
            Some(json!({ "address": "Node-A:8080/" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["peer"], "http://node-a:8080");

        let (_, body) = call(&app, Method::GET, "/peers", None).await;
        assert_eq!(body["peers"], json!(["http://node-a:8080"]));

        let (_, body) = call(&app, Method::GET, "/state", None).await;
        assert_eq!(body["num_peers"], 1);
        assert_eq!(body["chain_height"], 1);
    }

    #[tokio::test]
    async fn consensus_with_single_peer_is_trivially_true() {
        let app = router(test_state());
        call(&app, Method::POST, "/peers", Some(json!({ "address": "127.0.0.1:1" }))).await;
        let (status, body) = call(&app, Method::GET, "/consensus", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consensus"], true);
        assert_eq!(body["chain"].as_array().unwrap().len(), 1);
    }
}
