mod peers;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use minichain_core::{mine_candidate, Allocation, Block, Engine, Transaction};
use minichain_storage::{SledSnapshotStore, SnapshotStore};
use peers::PeerRegistry;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Leading zero hex chars required of a block hash
    #[arg(long, default_value_t = 2)]
    difficulty: usize,

    /// Genesis allocation as ADDR=AMOUNT; repeatable
    #[arg(long = "alloc", value_parser = parse_allocation)]
    allocations: Vec<Allocation>,

    /// Statically configured peer base URL; repeatable
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// This node's own base URL, excluded from broadcasts
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    self_url: String,
}

/// Resolves a loosely-typed ADDR=AMOUNT flag into a typed allocation at
/// the configuration boundary; the engine only ever sees the typed list.
fn parse_allocation(raw: &str) -> Result<Allocation, String> {
    let (address, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=AMOUNT, got `{raw}`"))?;
    if address.is_empty() {
        return Err(format!("empty address in `{raw}`"));
    }
    let amount: u64 = amount
        .parse()
        .map_err(|err| format!("bad amount in `{raw}`: {err}"))?;
    Ok(Allocation::new(address, amount))
}

#[derive(Clone)]
struct AppState {
    engine: Arc<RwLock<Engine>>,
    store: Arc<SledSnapshotStore>,
    peers: Arc<RwLock<PeerRegistry>>,
    client: reqwest::Client,
    self_url: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: usize,
    hash: String,
}

#[derive(Deserialize)]
struct TxIn {
    from: String,
    to: String,
    amount: u64,
}

#[derive(Deserialize)]
struct MineRequest {
    miner: String,
}

#[derive(Deserialize)]
struct PeerIn {
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(SledSnapshotStore::open(&args.data_dir)?);

    // A corrupt snapshot is fatal: refuse to start on guessed state.
    let engine = match store
        .load()
        .context("local snapshot is corrupt, refusing to start")?
    {
        Some(snapshot) => Engine::restore(args.difficulty, &args.allocations, snapshot)
            .context("persisted snapshot does not match this node's configuration")?,
        None => Engine::new(args.difficulty, &args.allocations),
    };
    info!(
        height = engine.chain().len(),
        difficulty = args.difficulty,
        "engine ready"
    );

    let state = AppState {
        engine: Arc::new(RwLock::new(engine)),
        store,
        peers: Arc::new(RwLock::new(PeerRegistry::new(args.peers))),
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?,
        self_url: args.self_url,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/chain", get(get_chain))
        .route("/chain/head", get(chain_head))
        .route("/balance/{address}", get(get_balance))
        .route("/mempool", get(get_mempool))
        .route("/transactions", post(submit_transaction))
        .route("/mine", post(mine))
        .route("/blocks", post(receive_block))
        .route("/resolve", post(resolve))
        .route("/peers", get(list_peers))
        .route("/peers/register", post(register_peer))
        .route("/peers/unregister", post(unregister_peer))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!("minichain-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn get_chain(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.engine.read().await.chain().to_vec())
}

async fn chain_head(State(state): State<AppState>) -> Json<Head> {
    let engine = state.engine.read().await;
    Json(Head {
        height: engine.chain().len(),
        hash: engine.tip().hash.clone(),
    })
}

async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Json<serde_json::Value> {
    let balance = state.engine.read().await.balance(&address);
    Json(json!({ "address": address, "balance": balance }))
}

async fn get_mempool(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.engine.read().await.mempool().to_vec())
}

async fn submit_transaction(
    State(state): State<AppState>,
    Json(tx): Json<TxIn>,
) -> (StatusCode, Json<serde_json::Value>) {
    let tx = Transaction::new(tx.from, tx.to, tx.amount);
    let mut engine = state.engine.write().await;
    match engine.submit_transaction(tx.clone()) {
        Ok(()) => (StatusCode::OK, Json(json!({ "accepted": true, "tx": tx }))),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "accepted": false, "reason": reason.to_string() })),
        ),
    }
}

async fn mine(State(state): State<AppState>, Json(req): Json<MineRequest>) -> Response {
    // Assemble the candidate under a short read guard, then run the
    // unbounded PoW search without holding any lock, so balance and
    // chain reads keep flowing while we search.
    let (candidate, difficulty) = {
        let engine = state.engine.read().await;
        (engine.candidate_block(&req.miner), engine.difficulty())
    };
    let mined = tokio::task::spawn_blocking(move || {
        let never = AtomicBool::new(false);
        mine_candidate(candidate, difficulty, &never)
            .expect("mining without a cancel signal always completes")
    })
    .await;

    let block = match mined {
        Ok(block) => block,
        Err(err) => {
            warn!(error = %err, "mining task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "mining task failed" })),
            )
                .into_response();
        }
    };

    // Commit under the write guard, re-checking the tip: if a peer block
    // landed while we searched, ours no longer links and is dropped.
    let accepted = {
        let mut engine = state.engine.write().await;
        let accepted = engine.accept_external_block(block.clone());
        if accepted {
            persist(state.store.as_ref(), &engine);
        }
        accepted
    };
    if !accepted {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "tip moved while mining, block dropped" })),
        )
            .into_response();
    }

    broadcast_block(&state, &block).await;
    Json(block).into_response()
}

async fn receive_block(
    State(state): State<AppState>,
    Json(block): Json<Block>,
) -> Json<serde_json::Value> {
    let mut engine = state.engine.write().await;
    let accepted = engine.accept_external_block(block);
    if accepted {
        persist(state.store.as_ref(), &engine);
    }
    Json(json!({ "accepted": accepted, "height": engine.chain().len() }))
}

/// Longest-chain conflict resolution: fetch every peer's chain, try the
/// candidates longest-first, adopt the first one the engine accepts.
/// One peer failing or lying never aborts the rest.
async fn resolve(State(state): State<AppState>) -> Json<serde_json::Value> {
    let peers = state.peers.read().await.all_except(&state.self_url);
    let mut candidates: Vec<Vec<Block>> = Vec::new();
    for peer in &peers {
        match fetch_chain(&state.client, peer).await {
            Ok(chain) => candidates.push(chain),
            Err(err) => warn!(peer = %peer, error = %err, "failed to fetch peer chain"),
        }
    }
    candidates.sort_by_key(|chain| std::cmp::Reverse(chain.len()));

    let mut engine = state.engine.write().await;
    let mut replaced = false;
    for candidate in candidates {
        if engine.replace_chain(candidate) {
            replaced = true;
            break;
        }
    }
    if replaced {
        persist(state.store.as_ref(), &engine);
    }
    Json(json!({ "replaced": replaced, "height": engine.chain().len() }))
}

async fn list_peers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.peers.read().await.all())
}

async fn register_peer(
    State(state): State<AppState>,
    Json(peer): Json<PeerIn>,
) -> Json<serde_json::Value> {
    let added = state.peers.write().await.register(&peer.url);
    Json(json!({ "added": added }))
}

async fn unregister_peer(
    State(state): State<AppState>,
    Json(peer): Json<PeerIn>,
) -> Json<serde_json::Value> {
    let removed = state.peers.write().await.unregister(&peer.url);
    Json(json!({ "removed": removed }))
}

/// Best-effort mirror of engine state: a failed save is logged and the
/// in-memory chain stays authoritative.
fn persist(store: &SledSnapshotStore, engine: &Engine) {
    if let Err(err) = store.save(&engine.snapshot()) {
        warn!(error = %err, "failed to persist snapshot");
    }
}

/// Announces a block to every known peer except ourselves. Each send is
/// an independent task; one peer's failure never delays the others.
async fn broadcast_block(state: &AppState, block: &Block) {
    let peers = state.peers.read().await.all_except(&state.self_url);
    for peer in peers {
        let client = state.client.clone();
        let block = block.clone();
        tokio::spawn(async move {
            let url = format!("{peer}/blocks");
            if let Err(err) = client.post(&url).json(&block).send().await {
                warn!(peer = %peer, error = %err, "failed to announce block");
            }
        });
    }
}

async fn fetch_chain(client: &reqwest::Client, peer: &str) -> anyhow::Result<Vec<Block>> {
    let res = client
        .get(format!("{peer}/chain"))
        .send()
        .await?
        .error_for_status()?;
    Ok(res.json().await?)
}
