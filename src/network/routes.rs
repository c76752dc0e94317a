// Request surface

use crate::chain::Blockchain;
use crate::consensus::DIFFICULTY;
use crate::core::{Amount, Block, Transaction};
use crate::network::node::{broadcast_to_peers, unix_now, Node};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerRequest {
    peer_address: String,
}

#[derive(Deserialize)]
struct TxRequest {
    from: String,
    to: String,
    amount: f64,
    #[serde(default)]
    fee: f64,
}

fn with_node(
    node: Arc<Node>,
) -> impl Filter<Extract = (Arc<Node>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || node.clone())
}

fn api_json(value: serde_json::Value, status: StatusCode) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&value), status)
}

/// The full route table of a node
pub(crate) fn routes(
    node: Arc<Node>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("health")
        .and(warp::get())
        .and(with_node(node.clone()))
        .then(handle_health);

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_node(node.clone()))
        .then(handle_status);

    let peers_get = warp::path!("peers")
        .and(warp::get())
        .and(with_node(node.clone()))
        .then(handle_peers_get);

    let peers_post = warp::path!("peers")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(handle_peers_post);

    let blockchain = warp::path!("blockchain")
        .and(warp::get())
        .and(with_node(node.clone()))
        .then(handle_blockchain);

    let blockchain_sync = warp::path!("blockchain" / "sync")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(handle_blockchain_sync);

    let balance = warp::path!("balance" / String)
        .and(warp::get())
        .and(with_node(node.clone()))
        .then(handle_balance);

    let transaction = warp::path!("transaction")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(handle_transaction);

    let transaction_broadcast = warp::path!("transaction" / "broadcast")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(handle_transaction_broadcast);

    let block_broadcast = warp::path!("block" / "broadcast")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_node(node.clone()))
        .then(handle_block_broadcast);

    let mine = warp::path!("mine")
        .and(warp::post())
        .and(with_node(node))
        .then(handle_mine);

    health
        .or(status)
        .or(peers_get)
        .or(peers_post)
        .or(blockchain_sync)
        .or(blockchain)
        .or(balance)
        .or(transaction_broadcast)
        .or(transaction)
        .or(block_broadcast)
        .or(mine)
}

async fn handle_health(node: Arc<Node>) -> WithStatus<Json> {
    api_json(
        json!({
            "status": "healthy",
            "nodeId": node.id,
            "port": node.port,
            "time": unix_now(),
        }),
        StatusCode::OK,
    )
}

async fn handle_status(node: Arc<Node>) -> WithStatus<Json> {
    let state = node.state.read().await;

    api_json(
        json!({
            "nodeId": node.id,
            "port": node.port,
            "peers": state.peers,
            "blockCount": state.blockchain.chain.len(),
            "difficulty": DIFFICULTY,
            "pendingTxs": state.blockchain.pending_transactions.len(),
            "minerWallet": node.miner.address,
        }),
        StatusCode::OK,
    )
}

async fn handle_peers_get(node: Arc<Node>) -> WithStatus<Json> {
    let state = node.state.read().await;

    api_json(
        json!({
            "nodeId": node.id,
            "peers": state.peers,
        }),
        StatusCode::OK,
    )
}

async fn handle_peers_post(request: PeerRequest, node: Arc<Node>) -> WithStatus<Json> {
    node.add_peer(&request.peer_address).await;

    api_json(
        json!({
            "message": "Peer added successfully",
            "peer": request.peer_address,
        }),
        StatusCode::OK,
    )
}

async fn handle_blockchain(node: Arc<Node>) -> WithStatus<Json> {
    let state = node.state.read().await;
    warp::reply::with_status(warp::reply::json(&state.blockchain), StatusCode::OK)
}

async fn handle_blockchain_sync(peer_chain: Blockchain, node: Arc<Node>) -> WithStatus<Json> {
    let mut state = node.state.write().await;

    if peer_chain.is_longer_than(&state.blockchain) && peer_chain.is_valid_chain() {
        log::info!(
            "Received longer valid chain ({} blocks vs {}), attempting to replace",
            peer_chain.chain.len(),
            state.blockchain.chain.len()
        );

        match state.blockchain.replace_chain(&peer_chain) {
            Ok(()) => api_json(
                json!({
                    "status": "chain_replaced",
                    "message": "Blockchain updated with longer chain",
                    "newLength": state.blockchain.chain.len(),
                }),
                StatusCode::OK,
            ),
            Err(e) => {
                log::error!("Failed to replace chain: {}", e);
                api_json(
                    json!({
                        "status": "error",
                        "message": "Chain replacement failed",
                    }),
                    StatusCode::BAD_REQUEST,
                )
            }
        }
    } else {
        api_json(
            json!({
                "status": "chain_not_replaced",
                "message": "Current chain is longer or peer chain is invalid",
                "currentLength": state.blockchain.chain.len(),
            }),
            StatusCode::OK,
        )
    }
}

async fn handle_balance(address: String, node: Arc<Node>) -> WithStatus<Json> {
    let state = node.state.read().await;
    let balance = state.blockchain.balance(&address);

    api_json(
        json!({
            "address": address,
            "balance": balance.as_coins(),
        }),
        StatusCode::OK,
    )
}

async fn handle_transaction(request: TxRequest, node: Arc<Node>) -> WithStatus<Json> {
    let (amount, fee) = match (
        Amount::from_coins(request.amount),
        Amount::from_coins(request.fee),
    ) {
        (Some(amount), Some(fee)) => (amount, fee),
        _ => {
            return api_json(
                json!({
                    "status": "rejected",
                    "message": "Amount and fee must be non-negative numbers",
                }),
                StatusCode::BAD_REQUEST,
            );
        }
    };

    let tx = {
        let mut state = node.state.write().await;

        let mut tx = match state
            .blockchain
            .create_transaction(&request.from, &request.to, amount, fee)
        {
            Ok(tx) => tx,
            Err(e) => {
                log::warn!("Failed to create transaction: {}", e);
                return api_json(
                    json!({
                        "status": "rejected",
                        "message": e.to_string(),
                    }),
                    StatusCode::BAD_REQUEST,
                );
            }
        };

        // Sign when this node owns the sender wallet; transfers for
        // foreign addresses stay unsigned as in the bare client flow
        if let Some(wallet) = node.wallets.get(&request.from) {
            match state.blockchain.prev_transactions(&tx) {
                Some(prev_txs) => {
                    if let Err(e) = wallet.sign(&mut tx, &prev_txs) {
                        log::warn!("Failed to sign transaction {}: {}", tx.id, e);
                    }
                }
                None => log::warn!("Referenced transactions missing for {}", tx.id),
            }
        }

        state.blockchain.add_pending(tx.clone());
        tx
    };

    log::info!("Broadcasting transaction {} to peers", &tx.id[..8]);
    let payload = serde_json::to_value(&tx).expect("transaction serialization cannot fail");
    tokio::spawn(broadcast_to_peers(
        node.clone(),
        "/transaction/broadcast",
        payload,
    ));

    api_json(
        json!({
            "transactionId": tx.id,
            "status": "pending",
            "message": "Transaction created and broadcasted to peers",
        }),
        StatusCode::OK,
    )
}

async fn handle_transaction_broadcast(tx: Transaction, node: Arc<Node>) -> WithStatus<Json> {
    let mut state = node.state.write().await;

    let tx_id = tx.id.clone();
    if !state.blockchain.add_pending(tx) {
        log::info!("Transaction {} already exists in pending pool", &tx_id[..8.min(tx_id.len())]);
        return api_json(json!({ "status": "already_exists" }), StatusCode::OK);
    }

    log::info!("Received broadcasted transaction {} from peer", &tx_id[..8.min(tx_id.len())]);

    api_json(
        json!({
            "status": "accepted",
            "message": "Transaction added to pending pool",
            "txId": tx_id,
        }),
        StatusCode::OK,
    )
}

async fn handle_block_broadcast(block: Block, node: Arc<Node>) -> WithStatus<Json> {
    let mut state = node.state.write().await;
    let chain_len = state.blockchain.chain.len() as u64;

    if block.index < chain_len {
        log::info!("Block #{} already exists or is outdated", block.index);
        return api_json(json!({ "status": "already_exists" }), StatusCode::OK);
    }

    if block.index > chain_len {
        log::info!(
            "Block #{} is not the next expected block (expected #{})",
            block.index,
            chain_len
        );
        return api_json(json!({ "status": "invalid_sequence" }), StatusCode::OK);
    }

    let index = block.index;
    let hash = block.hash.clone();

    match state.blockchain.submit_block(block) {
        Ok(()) => {
            log::info!("Accepted broadcasted block #{} from peer", index);
            api_json(
                json!({
                    "status": "accepted",
                    "message": "Block added to blockchain",
                    "blockIndex": index,
                    "blockHash": hash,
                }),
                StatusCode::OK,
            )
        }
        Err(e) => {
            log::warn!("Failed to accept broadcasted block #{}: {}", index, e);
            api_json(
                json!({
                    "status": "rejected",
                    "message": e.to_string(),
                }),
                StatusCode::BAD_REQUEST,
            )
        }
    }
}

async fn handle_mine(node: Arc<Node>) -> WithStatus<Json> {
    log::info!("Node {}: mining new block", node.id);

    let block = {
        // The write lock is held for the entire nonce search; mining
        // serializes with every other mutation
        let mut state = node.state.write().await;
        let block = node.miner.mine(&state.blockchain);

        if let Err(e) = state.blockchain.submit_block(block.clone()) {
            return api_json(
                json!({
                    "status": "error",
                    "message": format!("Failed to submit block: {}", e),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
        block
    };

    log::info!("Broadcasting mined block #{} to peers", block.index);
    let payload = serde_json::to_value(&block).expect("block serialization cannot fail");
    tokio::spawn(broadcast_to_peers(node.clone(), "/block/broadcast", payload));

    api_json(
        json!({
            "blockIndex": block.index,
            "blockHash": block.hash,
            "nonce": block.nonce,
            "message": "Block mined and broadcasted to peers",
        }),
        StatusCode::OK,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Miner;

    fn test_node() -> Arc<Node> {
        Arc::new(Node::new(0, None, None))
    }

    fn body_json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let node = test_node();
        let api = routes(node);

        let res = warp::test::request().path("/health").reply(&api).await;
        assert_eq!(res.status(), 200);

        let body = body_json(res.body());
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["nodeId"], "node-0");
    }

    #[tokio::test]
    async fn test_status() {
        let node = test_node();
        let miner_address = node.miner.address.clone();
        let api = routes(node);

        let res = warp::test::request().path("/status").reply(&api).await;
        let body = body_json(res.body());

        assert_eq!(body["blockCount"], 1);
        assert_eq!(body["difficulty"], DIFFICULTY);
        assert_eq!(body["pendingTxs"], 0);
        assert_eq!(body["minerWallet"], miner_address.as_str());
    }

    #[tokio::test]
    async fn test_mine_credits_miner() {
        let node = test_node();
        let miner_address = node.miner.address.clone();
        let api = routes(node);

        let res = warp::test::request()
            .method("POST")
            .path("/mine")
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let body = body_json(res.body());
        assert_eq!(body["blockIndex"], 1);

        let res = warp::test::request()
            .path(&format!("/balance/{}", miner_address))
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["balance"], 10.0);

        let res = warp::test::request().path("/status").reply(&api).await;
        assert_eq!(body_json(res.body())["blockCount"], 2);
    }

    #[tokio::test]
    async fn test_spend_and_change_flow() {
        let node = test_node();
        let miner_address = node.miner.address.clone();
        let api = routes(node);

        let res = warp::test::request()
            .method("POST")
            .path("/mine")
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("POST")
            .path("/transaction")
            .json(&json!({
                "from": miner_address,
                "to": "alice",
                "amount": 3.0,
                "fee": 0.1,
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let body = body_json(res.body());
        assert_eq!(body["status"], "pending");
        assert!(body["transactionId"].is_string());

        let res = warp::test::request()
            .method("POST")
            .path("/mine")
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .path(&format!("/balance/{}", miner_address))
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["balance"], 17.0);

        let res = warp::test::request().path("/balance/alice").reply(&api).await;
        assert_eq!(body_json(res.body())["balance"], 3.0);

        let res = warp::test::request().path("/status").reply(&api).await;
        assert_eq!(body_json(res.body())["blockCount"], 3);
    }

    #[tokio::test]
    async fn test_transaction_insufficient_funds() {
        let node = test_node();
        let api = routes(node);

        let res = warp::test::request()
            .method("POST")
            .path("/transaction")
            .json(&json!({
                "from": "alice",
                "to": "bob",
                "amount": 1.0,
                "fee": 0.0,
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);

        let res = warp::test::request().path("/status").reply(&api).await;
        assert_eq!(body_json(res.body())["pendingTxs"], 0);
    }

    #[tokio::test]
    async fn test_transaction_rejects_negative_amount() {
        let node = test_node();
        let api = routes(node);

        let res = warp::test::request()
            .method("POST")
            .path("/transaction")
            .json(&json!({
                "from": "alice",
                "to": "bob",
                "amount": -1.0,
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);
    }

    #[tokio::test]
    async fn test_broadcast_receive_is_idempotent() {
        let node = test_node();
        let api = routes(node);

        let tx = Transaction::new_coinbase("somebody", Amount::from_whole(1));

        let res = warp::test::request()
            .method("POST")
            .path("/transaction/broadcast")
            .json(&tx)
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["status"], "accepted");

        let res = warp::test::request()
            .method("POST")
            .path("/transaction/broadcast")
            .json(&tx)
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["status"], "already_exists");

        let res = warp::test::request().path("/status").reply(&api).await;
        assert_eq!(body_json(res.body())["pendingTxs"], 1);
    }

    #[tokio::test]
    async fn test_block_broadcast_sequencing() {
        let node = test_node();
        let genesis = node.state.read().await.blockchain.chain[0].clone();
        let api = routes(node);

        // Stale block
        let res = warp::test::request()
            .method("POST")
            .path("/block/broadcast")
            .json(&genesis)
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["status"], "already_exists");

        // Too far ahead
        let mut ahead = genesis.clone();
        ahead.index = 5;
        let res = warp::test::request()
            .method("POST")
            .path("/block/broadcast")
            .json(&ahead)
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["status"], "invalid_sequence");

        // Next in sequence, mined on a twin chain sharing the genesis
        let twin = crate::chain::Blockchain::in_memory();
        let block = Miner::new("peer-miner".to_string()).mine(&twin);
        let res = warp::test::request()
            .method("POST")
            .path("/block/broadcast")
            .json(&block)
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["status"], "accepted");

        let res = warp::test::request().path("/status").reply(&api).await;
        assert_eq!(body_json(res.body())["blockCount"], 2);
    }

    #[tokio::test]
    async fn test_sync_replaces_with_longer_chain() {
        let node = test_node();
        let api = routes(node);

        let mut remote = crate::chain::Blockchain::in_memory();
        for _ in 0..2 {
            let block = Miner::new("peer-miner".to_string()).mine(&remote);
            remote.submit_block(block).unwrap();
        }

        let res = warp::test::request()
            .method("POST")
            .path("/blockchain/sync")
            .json(&remote)
            .reply(&api)
            .await;
        let body = body_json(res.body());
        assert_eq!(body["status"], "chain_replaced");
        assert_eq!(body["newLength"], 3);

        // Same length now; incumbency wins
        let res = warp::test::request()
            .method("POST")
            .path("/blockchain/sync")
            .json(&remote)
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["status"], "chain_not_replaced");
    }

    #[tokio::test]
    async fn test_peers_roundtrip() {
        let node = test_node();
        let api = routes(node);

        let res = warp::test::request()
            .method("POST")
            .path("/peers")
            .json(&json!({ "peerAddress": "localhost:3001" }))
            .reply(&api)
            .await;
        assert_eq!(body_json(res.body())["peer"], "localhost:3001");

        // Duplicate registration is a no-op
        warp::test::request()
            .method("POST")
            .path("/peers")
            .json(&json!({ "peerAddress": "localhost:3001" }))
            .reply(&api)
            .await;

        let res = warp::test::request().path("/peers").reply(&api).await;
        let body = body_json(res.body());
        assert_eq!(body["peers"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blockchain_document() {
        let node = test_node();
        let api = routes(node);

        let res = warp::test::request().path("/blockchain").reply(&api).await;
        assert_eq!(res.status(), 200);

        let body = body_json(res.body());
        assert_eq!(body["chain"].as_array().unwrap().len(), 1);
        assert!(body["pendingTransactions"].as_array().unwrap().is_empty());
        assert!(body["utxoSet"].is_object());
    }
}
