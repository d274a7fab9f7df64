//! # REST + JSON-RPC API
//!
//! Builds the axum router that exposes the wallet runtime over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                                     | Description                    |
//! |--------|------------------------------------------|--------------------------------|
//! | GET    | `/health`                                | Liveness probe                 |
//! | POST   | `/rpc`                                   | JSON-RPC 2.0 gateway           |
//! | GET    | `/accounts/:address`                     | Balance and contract kind      |
//! | GET    | `/wallets/:address`                      | Wallet owners and transactions |
//! | GET    | `/registries/:address/wallets/:creator`  | Wallets deployed for a creator |
//! | GET    | `/events?from=N&emitter=0x..`            | Event log                      |
//!
//! ## JSON-RPC
//!
//! Parameters are named objects. Addresses are `0x`-prefixed hex, amounts
//! are decimal strings (plain numbers are accepted on input), payloads are
//! `0x`-prefixed hex or a `call` object that the node encodes itself.
//! Every state-changing method takes the acting `caller` explicitly: the node
//! is a development gateway and does not authenticate requests.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use quorum_contracts::{
    Address, Call, Contract, LogEntry, PayloadError, Runtime, RuntimeError, WalletError,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The contract runtime. Calls are short and synchronous, so a blocking
    /// lock is held for the duration of one call and never across an await.
    pub runtime: Arc<RwLock<Runtime>>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/rpc", post(rpc_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/wallets/:address", get(wallet_handler))
        .route(
            "/registries/:address/wallets/:creator",
            get(registry_wallets_handler),
        )
        .route("/events", get(events_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Method parameters, as a named object.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Invalid JSON-RPC envelope.
pub const INVALID_REQUEST: i32 = -32600;
/// Unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Parameters missing or malformed.
pub const INVALID_PARAMS: i32 = -32602;
/// Failure inside the node itself.
pub const INTERNAL_ERROR: i32 = -32603;
/// The contract rejected the call; nothing changed.
pub const CALL_REJECTED: i32 = -32000;
/// The addressed contract or transaction does not exist.
pub const NOT_FOUND: i32 = -32001;

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn invalid_params(message: impl std::fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", message))
    }
}

impl From<RuntimeError> for JsonRpcError {
    fn from(err: RuntimeError) -> Self {
        let code = match &err {
            RuntimeError::UnknownContract(_)
            | RuntimeError::NotAWallet(_)
            | RuntimeError::NotARegistry(_)
            | RuntimeError::NotACounter(_)
            | RuntimeError::Wallet(WalletError::TransactionNotFound(_)) => NOT_FOUND,
            _ => CALL_REJECTED,
        };
        Self::new(code, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    /// The account address.
    pub address: Address,
    /// Balance as a decimal string.
    pub balance: String,
    /// Contract kind, if a contract lives at the address.
    pub contract: Option<String>,
}

/// Response payload for `GET /wallets/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponse {
    pub address: Address,
    pub registry: Address,
    pub owners: Vec<Address>,
    pub num_confirmations_required: u64,
    /// Balance as a decimal string.
    pub balance: String,
    /// RFC 3339 deployment time.
    pub created_at: String,
    pub transactions: Vec<TransactionResponse>,
}

/// One wallet transaction inside a [`WalletResponse`].
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub index: u64,
    pub target: Address,
    /// Value as a decimal string.
    pub value: String,
    /// `0x`-prefixed payload bytes.
    pub payload: String,
    /// Decoded call name, when the payload is a known call.
    pub call: Option<String>,
    pub executed: bool,
    pub num_confirmations: u64,
    /// Every counted confirmation, sorted. May name owners deleted since they
    /// confirmed, so its length always equals `num_confirmations`.
    pub confirmed_by: Vec<Address>,
}

/// Response payload for `GET /registries/:address/wallets/:creator`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryWalletsResponse {
    pub registry: Address,
    pub creator: Address,
    pub wallets: Vec<Address>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query string for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// First sequence number to return.
    #[serde(default)]
    pub from: u64,
    /// Only events emitted by this contract.
    pub emitter: Option<String>,
}

fn amount_string(value: u128) -> String {
    value.to_string()
}

fn wallet_view(rt: &Runtime, address: Address) -> Result<WalletResponse, RuntimeError> {
    let wallet = rt.wallet(&address)?;
    let transactions = (0..wallet.transaction_count())
        .filter_map(|i| wallet.transaction(i).map(|tx| (i, tx)))
        .map(|(index, tx)| TransactionResponse {
            index,
            target: tx.target,
            value: amount_string(tx.value),
            payload: format!("0x{}", hex::encode(&tx.payload)),
            call: Call::decode(&tx.payload).ok().map(|c| c.name().to_string()),
            executed: tx.executed,
            num_confirmations: tx.num_confirmations,
            confirmed_by: tx.confirmers(),
        })
        .collect();

    Ok(WalletResponse {
        address,
        registry: wallet.registry(),
        owners: wallet.owners().to_vec(),
        num_confirmations_required: wallet.num_confirmations_required(),
        balance: amount_string(rt.balance_of(&address)),
        created_at: wallet.created_at().to_rfc3339(),
        transactions,
    })
}

/// Number of wallets deployed across all registries.
pub fn count_wallets(rt: &Runtime) -> i64 {
    rt.contracts()
        .filter(|(_, c)| matches!(c, Contract::Wallet(_)))
        .count() as i64
}

fn error_response(status: StatusCode, error: impl std::fmt::Display) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn parse_address(raw: &str) -> Result<Address, axum::response::Response> {
    raw.parse::<Address>()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid address {}: {}", raw, e)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": state.version,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `GET /accounts/:address`: balance of any address.
async fn account_handler(Path(address): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    let address = match parse_address(&address) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let rt = state.runtime.read();
    Json(AccountResponse {
        address,
        balance: amount_string(rt.balance_of(&address)),
        contract: rt.contract(&address).map(|c| c.kind().to_string()),
    })
    .into_response()
}

/// `GET /wallets/:address`: owners, threshold, balance and transactions.
async fn wallet_handler(Path(address): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    let address = match parse_address(&address) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let rt = state.runtime.read();
    match wallet_view(&rt, address) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e),
    }
}

/// `GET /registries/:address/wallets/:creator`: wallets deployed for a creator.
async fn registry_wallets_handler(
    Path((registry, creator)): Path<(String, String)>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let (registry, creator) = match (parse_address(&registry), parse_address(&creator)) {
        (Ok(r), Ok(c)) => (r, c),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    let rt = state.runtime.read();
    match rt.wallets_of(&registry, &creator) {
        Ok(wallets) => Json(RegistryWalletsResponse {
            registry,
            creator,
            wallets,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e),
    }
}

/// `GET /events`: the event log, optionally from a sequence number and
/// filtered by emitter.
async fn events_handler(Query(query): Query<EventsQuery>, State(state): State<AppState>) -> impl IntoResponse {
    let emitter = match query.emitter.as_deref().map(parse_address).transpose() {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let rt = state.runtime.read();
    let entries: Vec<LogEntry> = rt
        .logs_since(query.from)
        .iter()
        .filter(|entry| emitter.map_or(true, |e| entry.emitter == e))
        .cloned()
        .collect();
    Json(entries).into_response()
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
async fn rpc_handler(State(state): State<AppState>, Json(req): Json<JsonRpcRequest>) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            id: req.id,
        });
    }

    let timer = state.metrics.rpc_latency_seconds.start_timer();
    let outcome = dispatch(&state, &req.method, req.params.unwrap_or(Value::Null));
    timer.observe_duration();

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(err) => {
            tracing::debug!(method = %req.method, code = err.code, error = %err.message, "rpc call failed");
            (None, Some(err))
        }
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

// ---------------------------------------------------------------------------
// JSON-RPC Methods
// ---------------------------------------------------------------------------

/// Accepts amounts as JSON numbers or decimal strings.
mod amount {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(u128::from(n)),
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Deserialize)]
struct AccountParams {
    account: Address,
}

#[derive(Deserialize)]
struct CreditParams {
    account: Address,
    #[serde(deserialize_with = "amount::deserialize")]
    amount: u128,
}

#[derive(Deserialize)]
struct DeployParams {
    deployer: Address,
}

#[derive(Deserialize)]
struct WalletParams {
    wallet: Address,
}

#[derive(Deserialize)]
struct WalletsOfParams {
    registry: Address,
    creator: Address,
}

#[derive(Deserialize)]
struct LogsParams {
    #[serde(default)]
    from: u64,
}

#[derive(Deserialize)]
struct CreateWalletParams {
    caller: Address,
    registry: Address,
    owners: Vec<Address>,
    required: u64,
}

#[derive(Deserialize)]
struct RelayOwnerParams {
    caller: Address,
    registry: Address,
    owner: Address,
}

#[derive(Deserialize)]
struct RelayThresholdParams {
    caller: Address,
    registry: Address,
    required: u64,
}

#[derive(Deserialize)]
struct WalletOwnerParams {
    caller: Address,
    wallet: Address,
    owner: Address,
}

#[derive(Deserialize)]
struct WalletThresholdParams {
    caller: Address,
    wallet: Address,
    required: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitParams {
    caller: Address,
    wallet: Address,
    target: Address,
    #[serde(default, deserialize_with = "amount::deserialize")]
    value: u128,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    call: Option<Call>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxParams {
    caller: Address,
    wallet: Address,
    tx_index: u64,
}

#[derive(Deserialize)]
struct TransferParams {
    caller: Address,
    target: Address,
    #[serde(default, deserialize_with = "amount::deserialize")]
    value: u128,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    call: Option<Call>,
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(JsonRpcError::invalid_params)
}

fn to_json<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {}", e)))
}

/// Resolves the `payload` / `call` pair into raw payload bytes.
fn payload_bytes(payload: Option<String>, call: Option<Call>) -> Result<Vec<u8>, JsonRpcError> {
    match (payload, call) {
        (Some(_), Some(_)) => Err(JsonRpcError::invalid_params("pass either payload or call, not both")),
        (Some(hex_str), None) => {
            let body = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
            hex::decode(body).map_err(|e| JsonRpcError::invalid_params(PayloadError::Malformed(e.to_string())))
        }
        (None, Some(call)) => Ok(call.encode()),
        (None, None) => Ok(Vec::new()),
    }
}

/// Runs a state-changing call under the write lock and records the outcome.
fn mutate<T: Serialize>(
    state: &AppState,
    f: impl FnOnce(&mut Runtime) -> Result<T, RuntimeError>,
) -> Result<Value, JsonRpcError> {
    let result = {
        let mut rt = state.runtime.write();
        let result = f(&mut rt);
        state.metrics.wallets_deployed.set(count_wallets(&rt));
        result
    };

    match result {
        Ok(value) => to_json(value),
        Err(err) => {
            state.metrics.calls_failed_total.inc();
            Err(err.into())
        }
    }
}

fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, JsonRpcError> {
    match method {
        // -- Reads -----------------------------------------------------------
        "quorum_version" => Ok(json!(state.version)),
        "quorum_balanceOf" => {
            let p: AccountParams = parse(params)?;
            Ok(json!(amount_string(state.runtime.read().balance_of(&p.account))))
        }
        "quorum_getOwners" => {
            let p: WalletParams = parse(params)?;
            let owners = state.runtime.read().owners(&p.wallet)?;
            to_json(owners)
        }
        "quorum_getWallet" => {
            let p: WalletParams = parse(params)?;
            let view = wallet_view(&state.runtime.read(), p.wallet)?;
            to_json(view)
        }
        "quorum_walletsOf" => {
            let p: WalletsOfParams = parse(params)?;
            let wallets = state.runtime.read().wallets_of(&p.registry, &p.creator)?;
            to_json(wallets)
        }
        "quorum_getLogs" => {
            let p: LogsParams = parse(params)?;
            to_json(state.runtime.read().logs_since(p.from))
        }
        "quorum_encodeCall" => {
            let call: Call = parse(params)?;
            Ok(json!(format!("0x{}", hex::encode(call.encode()))))
        }

        // -- Setup -----------------------------------------------------------
        "quorum_credit" => {
            let p: CreditParams = parse(params)?;
            mutate(state, |rt| rt.credit(p.account, p.amount).map(amount_string))
        }
        "quorum_deployRegistry" => {
            let p: DeployParams = parse(params)?;
            mutate(state, |rt| rt.deploy_registry(p.deployer))
        }
        "quorum_deployCounter" => {
            let p: DeployParams = parse(params)?;
            mutate(state, |rt| rt.deploy_counter(p.deployer))
        }

        // -- Registry --------------------------------------------------------
        "quorum_createWallet" => {
            let p: CreateWalletParams = parse(params)?;
            mutate(state, |rt| rt.create_wallet(p.caller, p.registry, p.owners, p.required))
        }
        "quorum_relayAddOwner" => {
            let p: RelayOwnerParams = parse(params)?;
            mutate(state, |rt| rt.relay_add_owner(p.caller, p.registry, p.owner))
        }
        "quorum_relayDeleteOwner" => {
            let p: RelayOwnerParams = parse(params)?;
            mutate(state, |rt| rt.relay_delete_owner(p.caller, p.registry, p.owner))
        }
        "quorum_relaySetConfirmationsRequired" => {
            let p: RelayThresholdParams = parse(params)?;
            mutate(state, |rt| {
                rt.relay_set_confirmations_required(p.caller, p.registry, p.required)
            })
        }

        // -- Wallet governance -----------------------------------------------
        "quorum_addOwner" => {
            let p: WalletOwnerParams = parse(params)?;
            mutate(state, |rt| rt.add_owner(p.caller, p.wallet, p.owner))
        }
        "quorum_deleteOwner" => {
            let p: WalletOwnerParams = parse(params)?;
            mutate(state, |rt| rt.delete_owner(p.caller, p.wallet, p.owner))
        }
        "quorum_setConfirmationsRequired" => {
            let p: WalletThresholdParams = parse(params)?;
            mutate(state, |rt| rt.set_confirmations_required(p.caller, p.wallet, p.required))
        }

        // -- Wallet transactions ---------------------------------------------
        "quorum_submitTransaction" => {
            let p: SubmitParams = parse(params)?;
            let payload = payload_bytes(p.payload, p.call)?;
            let index = mutate(state, |rt| {
                rt.submit_transaction(p.caller, p.wallet, p.target, p.value, payload)
            })?;
            state.metrics.transactions_submitted_total.inc();
            Ok(index)
        }
        "quorum_confirmTransaction" => {
            let p: TxParams = parse(params)?;
            let out = mutate(state, |rt| rt.confirm_transaction(p.caller, p.wallet, p.tx_index))?;
            state.metrics.confirmations_total.inc();
            Ok(out)
        }
        "quorum_revokeConfirmation" => {
            let p: TxParams = parse(params)?;
            mutate(state, |rt| rt.revoke_confirmation(p.caller, p.wallet, p.tx_index))
        }
        "quorum_executeTransaction" => {
            let p: TxParams = parse(params)?;
            let out = mutate(state, |rt| rt.execute_transaction(p.caller, p.wallet, p.tx_index))?;
            state.metrics.transactions_executed_total.inc();
            Ok(out)
        }

        // -- Value -----------------------------------------------------------
        "quorum_transfer" => {
            let p: TransferParams = parse(params)?;
            let payload = payload_bytes(p.payload, p.call)?;
            mutate(state, |rt| rt.transfer(p.caller, p.target, p.value, &payload))
        }

        _ => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
