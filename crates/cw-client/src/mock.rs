//! In-memory node for tests and local development
//!
//! Implements [`NodeRpc`] with just enough chain behavior to exercise the
//! full transaction lifecycle: CheckTx sequence and signature checks, a
//! mempool, explicit or automatic block production, bank transfers, code
//! storage, contract instantiation at derived addresses, and a token wrapper
//! contract. Faults can be injected per call.

use crate::error::RpcError;
use crate::transport::{
    BroadcastResponse, NodeRpc, QueryResponse, TxStatus, CODE_WRONG_SEQUENCE,
};
use async_trait::async_trait;
use cw_crypto::{verify_signature, PublicKey};
use cw_types::{
    query::{
        AccountResponse, BlockInfo, CodeResponse, ContractInfo, InfoResponse, SimulateResponse,
        APP_QUERY_PATH, SIMULATE_QUERY_PATH,
    },
    tx_hash, Addr, Coin, Coins, Event, Hash, Message, PubKey, QueryRequest, Tx,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

const CODE_TX_DECODE: u32 = 2;
const CODE_UNAUTHORIZED: u32 = 4;
const CODE_INSUFFICIENT_FUNDS: u32 = 5;
const CODE_NOT_FOUND: u32 = 7;
const CODE_ALREADY_EXISTS: u32 = 8;
const CODE_OUT_OF_GAS: u32 = 11;
const CODE_INVALID_REQUEST: u32 = 18;

const BASE_GAS: u64 = 50_000;
const GAS_PER_TX_BYTE: u64 = 10;
const GAS_PER_MSG: u64 = 25_000;
const GAS_PER_CODE_BYTE: u64 = 2;

/// Prefix of tokens minted by the wrapper contract
pub const WRAPPED_PREFIX: &str = "wrapped/";

/// Failure modes for the next broadcast
#[derive(Clone, Debug)]
pub enum BroadcastFault {
    /// Fail before the node sees the transaction
    Error(RpcError),
    /// Accept the transaction, then never answer
    AcceptAndHang,
    /// Answer with a sequence mismatch whatever the sequence
    SequenceMismatch,
}

#[derive(Clone, Debug, Default)]
struct MockAccount {
    /// Committed sequence
    sequence: u64,
    /// Sequence including mempool transactions
    check_sequence: u64,
    public_key: Option<PubKey>,
}

#[derive(Clone, Debug)]
struct MockContract {
    info: ContractInfo,
    init_msg: Value,
}

#[derive(Clone, Debug, Default)]
struct Ledger {
    balances: HashMap<Addr, Coins>,
    codes: HashMap<Hash, u64>,
    contracts: HashMap<Addr, MockContract>,
}

struct ExecError {
    code: u32,
    log: String,
}

impl ExecError {
    fn new(code: u32, log: impl Into<String>) -> Self {
        Self {
            code,
            log: log.into(),
        }
    }
}

#[derive(Default)]
struct MockState {
    height: u64,
    timestamp: u64,
    producing_blocks: bool,
    accounts: HashMap<Addr, MockAccount>,
    ledger: Ledger,
    wrapper_codes: Vec<Hash>,
    mempool: Vec<(Hash, Tx, usize)>,
    results: HashMap<Hash, TxStatus>,
    broadcast_log: Vec<(Addr, u64)>,
    broadcast_faults: VecDeque<BroadcastFault>,
    query_faults: VecDeque<RpcError>,
    tx_faults: VecDeque<RpcError>,
    query_calls: u64,
    tx_calls: u64,
}

/// In-memory node
pub struct MockNode {
    chain_id: String,
    state: Mutex<MockState>,
}

impl MockNode {
    /// A node that commits pending transactions whenever it is asked about
    /// chain state
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            state: Mutex::new(MockState {
                producing_blocks: true,
                ..MockState::default()
            }),
        }
    }

    /// Genesis balance
    pub fn with_balance(mut self, address: Addr, coins: Coins) -> Self {
        let state = self.state.get_mut();
        let balance = state.ledger.balances.entry(address).or_default();
        for coin in coins.into_vec() {
            // only fails on zero coins, which `Coins` never holds
            let _ = balance.add(coin);
        }
        self
    }

    /// Contracts instantiated from this code behave as token wrappers
    pub fn with_wrapper_code(mut self, code_hash: Hash) -> Self {
        self.state.get_mut().wrapper_codes.push(code_hash);
        self
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// While off, transactions wait in the mempool until
    /// [`produce_block`](Self::produce_block)
    pub async fn set_producing_blocks(&self, producing: bool) {
        self.state.lock().await.producing_blocks = producing;
    }

    /// Commit everything in the mempool as one block
    pub async fn produce_block(&self) -> u64 {
        let mut state = self.state.lock().await;
        commit_block(&mut state);
        state.height
    }

    pub async fn height(&self) -> u64 {
        self.state.lock().await.height
    }

    pub async fn mempool_len(&self) -> usize {
        self.state.lock().await.mempool.len()
    }

    pub async fn balances(&self, address: &Addr) -> Coins {
        self.state
            .lock()
            .await
            .ledger
            .balances
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Every accepted broadcast as (sender, sequence), in arrival order
    pub async fn broadcast_log(&self) -> Vec<(Addr, u64)> {
        self.state.lock().await.broadcast_log.clone()
    }

    pub async fn query_calls(&self) -> u64 {
        self.state.lock().await.query_calls
    }

    pub async fn tx_calls(&self) -> u64 {
        self.state.lock().await.tx_calls
    }

    /// Consume a sequence number behind the client's back, as another
    /// process signing with the same key would
    pub async fn bump_sequence(&self, address: &Addr) {
        let mut state = self.state.lock().await;
        let account = state.accounts.entry(*address).or_default();
        account.sequence += 1;
        account.check_sequence += 1;
    }

    pub async fn push_broadcast_fault(&self, fault: BroadcastFault) {
        self.state.lock().await.broadcast_faults.push_back(fault);
    }

    /// Fail the next `count` ABCI queries with `error`
    pub async fn fail_queries(&self, count: usize, error: RpcError) {
        let mut state = self.state.lock().await;
        state
            .query_faults
            .extend(std::iter::repeat(error).take(count));
    }

    /// Fail the next `count` tx lookups with `error`
    pub async fn fail_tx_lookups(&self, count: usize, error: RpcError) {
        let mut state = self.state.lock().await;
        state.tx_faults.extend(std::iter::repeat(error).take(count));
    }

    fn check_tx(&self, state: &mut MockState, tx: &Tx) -> Result<(), ExecError> {
        let account = state.accounts.entry(tx.sender).or_default();
        if tx.sequence != account.check_sequence {
            return Err(ExecError::new(
                CODE_WRONG_SEQUENCE,
                format!(
                    "account sequence mismatch, expected {}, got {}: incorrect account sequence",
                    account.check_sequence, tx.sequence
                ),
            ));
        }

        let public_key = PublicKey::from_pubkey(&tx.public_key)
            .map_err(|e| ExecError::new(CODE_UNAUTHORIZED, format!("unauthorized: {e}")))?;

        match &account.public_key {
            Some(registered) if *registered != tx.public_key => {
                return Err(ExecError::new(
                    CODE_UNAUTHORIZED,
                    "unauthorized: public key does not match account",
                ));
            }
            // First use binds the account to the key its address derives from
            None if public_key.address() != tx.sender => {
                return Err(ExecError::new(
                    CODE_UNAUTHORIZED,
                    "unauthorized: public key does not derive sender address",
                ));
            }
            _ => {}
        }
        let sign_bytes = tx
            .sign_doc(&self.chain_id)
            .to_bytes()
            .map_err(|e| ExecError::new(CODE_TX_DECODE, e.to_string()))?;
        verify_signature(&public_key, &sign_bytes, &tx.signature).map_err(|_| {
            ExecError::new(
                CODE_UNAUTHORIZED,
                "unauthorized: signature verification failed",
            )
        })?;

        for msg in &tx.msgs {
            if msg.sender() != &tx.sender {
                return Err(ExecError::new(
                    CODE_UNAUTHORIZED,
                    "unauthorized: message sender is not the tx sender",
                ));
            }
            msg.validate_basic()
                .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
        }

        account.public_key = Some(tx.public_key.clone());
        account.check_sequence += 1;
        Ok(())
    }

    fn handle_app_query(&self, state: &MockState, data: &[u8]) -> Result<Vec<u8>, ExecError> {
        let request: QueryRequest = cw_types::decode(data)
            .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;

        match request {
            QueryRequest::Info {} => encode(&InfoResponse {
                chain_id: self.chain_id.clone(),
                last_finalized_block: BlockInfo {
                    height: state.height,
                    timestamp: state.timestamp,
                },
            }),
            QueryRequest::Balance { address, denom } => {
                let amount = state
                    .ledger
                    .balances
                    .get(&address)
                    .map(|coins| coins.amount_of(&denom))
                    .unwrap_or_default();
                let coin = Coin::new(denom, amount)
                    .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
                encode(&coin)
            }
            QueryRequest::Balances { address } => encode(
                &state
                    .ledger
                    .balances
                    .get(&address)
                    .cloned()
                    .unwrap_or_default(),
            ),
            QueryRequest::Account { address } => {
                let account = state.accounts.get(&address).cloned().unwrap_or_default();
                encode(&AccountResponse {
                    address,
                    sequence: account.sequence,
                    public_key: account.public_key,
                })
            }
            QueryRequest::Code { hash } => {
                let size = state
                    .ledger
                    .codes
                    .get(&hash)
                    .ok_or_else(|| {
                        ExecError::new(CODE_NOT_FOUND, format!("code {hash} not found"))
                    })?;
                encode(&CodeResponse { hash, size: *size })
            }
            QueryRequest::Contract { address } => {
                let contract = state.ledger.contracts.get(&address).ok_or_else(|| {
                    ExecError::new(CODE_NOT_FOUND, format!("contract {address} not found"))
                })?;
                encode(&contract.info)
            }
            QueryRequest::WasmSmart { contract, msg } => {
                let contract = state.ledger.contracts.get(&contract).ok_or_else(|| {
                    ExecError::new(CODE_NOT_FOUND, format!("contract {contract} not found"))
                })?;
                if msg.get("config").is_some() {
                    encode(&contract.init_msg)
                } else {
                    Err(ExecError::new(CODE_INVALID_REQUEST, "unknown query"))
                }
            }
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ExecError> {
    cw_types::encode(value).map_err(|e| ExecError::new(1, e.to_string()))
}

fn gas_for(tx: &Tx, tx_len: usize) -> u64 {
    let code_bytes: u64 = tx
        .msgs
        .iter()
        .map(|msg| match msg {
            Message::StoreCode(m) => m.wasm_byte_code.len() as u64 * GAS_PER_CODE_BYTE,
            _ => 0,
        })
        .sum();
    BASE_GAS + tx_len as u64 * GAS_PER_TX_BYTE + tx.msgs.len() as u64 * GAS_PER_MSG + code_bytes
}

fn commit_block(state: &mut MockState) {
    state.height += 1;
    state.timestamp += 1;
    let height = state.height;
    let wrapper_codes = state.wrapper_codes.clone();

    for (hash, tx, tx_len) in std::mem::take(&mut state.mempool) {
        let account = state.accounts.entry(tx.sender).or_default();
        account.sequence += 1;
        account.public_key = Some(tx.public_key.clone());

        let gas_used = gas_for(&tx, tx_len);
        let mut ledger = state.ledger.clone();
        let outcome = if gas_used > tx.fee.gas_limit {
            Err(ExecError::new(
                CODE_OUT_OF_GAS,
                format!("out of gas: used {gas_used}, limit {}", tx.fee.gas_limit),
            ))
        } else {
            execute_msgs(&mut ledger, &wrapper_codes, &tx.msgs)
        };

        let status = match outcome {
            Ok(events) => {
                state.ledger = ledger;
                TxStatus {
                    hash,
                    height,
                    code: 0,
                    log: String::new(),
                    gas_wanted: tx.fee.gas_limit,
                    gas_used,
                    events,
                }
            }
            Err(err) => TxStatus {
                hash,
                height,
                code: err.code,
                log: err.log,
                gas_wanted: tx.fee.gas_limit,
                gas_used,
                events: Vec::new(),
            },
        };
        debug!(hash = %hash, height, code = status.code, "Mock node executed tx");
        state.results.insert(hash, status);
    }
}

fn execute_msgs(
    ledger: &mut Ledger,
    wrapper_codes: &[Hash],
    msgs: &[Message],
) -> Result<Vec<Event>, ExecError> {
    let mut events = Vec::new();
    for msg in msgs {
        match msg {
            Message::Transfer(m) => {
                move_coins(ledger, &m.sender, &m.to, &m.coins)?;
                events.push(
                    Event::new("transfer")
                        .add_attribute("sender", m.sender.to_string())
                        .add_attribute("recipient", m.to.to_string())
                        .add_attribute("amount", m.coins.to_string()),
                );
                if is_wrapper(ledger, wrapper_codes, &m.to) {
                    events.push(wrap_or_unwrap(ledger, &m.to, &m.sender, &m.coins)?);
                }
            }
            Message::StoreCode(m) => {
                let hash = Hash::of(&m.wasm_byte_code);
                if ledger.codes.contains_key(&hash) {
                    return Err(ExecError::new(
                        CODE_ALREADY_EXISTS,
                        format!("code {hash} already exists"),
                    ));
                }
                ledger.codes.insert(hash, m.wasm_byte_code.len() as u64);
                events.push(Event::new("store_code").add_attribute("code_hash", hash.to_string()));
            }
            Message::Instantiate(m) => {
                if !ledger.codes.contains_key(&m.code_hash) {
                    return Err(ExecError::new(
                        CODE_NOT_FOUND,
                        format!("code {} not found", m.code_hash),
                    ));
                }
                let address = m.contract_address();
                if ledger.contracts.contains_key(&address) {
                    return Err(ExecError::new(
                        CODE_ALREADY_EXISTS,
                        format!("contract {address} already exists"),
                    ));
                }
                ledger.contracts.insert(
                    address,
                    MockContract {
                        info: ContractInfo {
                            address,
                            code_hash: m.code_hash,
                            admin: m.admin,
                        },
                        init_msg: m.msg.clone(),
                    },
                );
                move_coins(ledger, &m.sender, &address, &m.funds)?;
                events.push(
                    Event::new("instantiate")
                        .add_attribute("contract_address", address.to_string())
                        .add_attribute("code_hash", m.code_hash.to_string()),
                );
            }
            Message::Execute(m) => {
                if !ledger.contracts.contains_key(&m.contract) {
                    return Err(ExecError::new(
                        CODE_NOT_FOUND,
                        format!("contract {} not found", m.contract),
                    ));
                }
                move_coins(ledger, &m.sender, &m.contract, &m.funds)?;
                events.push(
                    Event::new("execute").add_attribute("contract_address", m.contract.to_string()),
                );
            }
            Message::Migrate(m) => {
                if !ledger.codes.contains_key(&m.new_code_hash) {
                    return Err(ExecError::new(
                        CODE_NOT_FOUND,
                        format!("code {} not found", m.new_code_hash),
                    ));
                }
                let contract = ledger.contracts.get_mut(&m.contract).ok_or_else(|| {
                    ExecError::new(CODE_NOT_FOUND, format!("contract {} not found", m.contract))
                })?;
                if contract.info.admin != Some(m.sender) {
                    return Err(ExecError::new(
                        CODE_UNAUTHORIZED,
                        "unauthorized: sender is not the contract admin",
                    ));
                }
                contract.info.code_hash = m.new_code_hash;
                events.push(
                    Event::new("migrate")
                        .add_attribute("contract_address", m.contract.to_string())
                        .add_attribute("code_hash", m.new_code_hash.to_string()),
                );
            }
        }
    }
    Ok(events)
}

fn is_wrapper(ledger: &Ledger, wrapper_codes: &[Hash], address: &Addr) -> bool {
    ledger
        .contracts
        .get(address)
        .is_some_and(|c| wrapper_codes.contains(&c.info.code_hash))
}

fn move_coins(ledger: &mut Ledger, from: &Addr, to: &Addr, coins: &Coins) -> Result<(), ExecError> {
    for coin in coins {
        ledger
            .balances
            .entry(*from)
            .or_default()
            .deduct(coin)
            .map_err(|e| {
                ExecError::new(CODE_INSUFFICIENT_FUNDS, format!("insufficient funds: {e}"))
            })?;
        ledger
            .balances
            .entry(*to)
            .or_default()
            .add(coin.clone())
            .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
    }
    Ok(())
}

// Native coins sent to the wrapper mint `wrapped/{denom}` to the sender;
// wrapped coins sent back are burned and the natives returned.
fn wrap_or_unwrap(
    ledger: &mut Ledger,
    wrapper: &Addr,
    sender: &Addr,
    coins: &Coins,
) -> Result<Event, ExecError> {
    let mut minted = Vec::new();
    for coin in coins {
        match coin.denom.strip_prefix(WRAPPED_PREFIX) {
            Some(native) => {
                let burn = ledger.balances.entry(*wrapper).or_default();
                burn.deduct(coin)
                    .map_err(|e| ExecError::new(CODE_INSUFFICIENT_FUNDS, e.to_string()))?;
                let native = Coin::new(native, coin.amount.clone())
                    .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
                let payout = Coins::new(vec![native.clone()])
                    .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
                move_coins(ledger, wrapper, sender, &payout)?;
                minted.push(native);
            }
            None => {
                let wrapped =
                    Coin::new(format!("{WRAPPED_PREFIX}{}", coin.denom), coin.amount.clone())
                        .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
                ledger
                    .balances
                    .entry(*sender)
                    .or_default()
                    .add(wrapped.clone())
                    .map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
                minted.push(wrapped);
            }
        }
    }
    let minted =
        Coins::new(minted).map_err(|e| ExecError::new(CODE_INVALID_REQUEST, e.to_string()))?;
    Ok(Event::new("wasm")
        .add_attribute("contract_address", wrapper.to_string())
        .add_attribute("action", "wrap")
        .add_attribute("minted", minted.to_string()))
}

#[async_trait]
impl NodeRpc for MockNode {
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<BroadcastResponse, RpcError> {
        let hash = tx_hash(tx_bytes);
        let hang = {
            let mut state = self.state.lock().await;
            let fault = state.broadcast_faults.pop_front();

            let tx = match Tx::from_bytes(tx_bytes) {
                Ok(tx) => tx,
                Err(e) => {
                    return Ok(BroadcastResponse {
                        code: CODE_TX_DECODE,
                        log: format!("tx parse error: {e}"),
                        hash,
                    })
                }
            };

            match &fault {
                Some(BroadcastFault::Error(err)) => return Err(err.clone()),
                Some(BroadcastFault::SequenceMismatch) => {
                    let expected = state
                        .accounts
                        .get(&tx.sender)
                        .map(|a| a.check_sequence)
                        .unwrap_or_default();
                    return Ok(BroadcastResponse {
                        code: CODE_WRONG_SEQUENCE,
                        log: format!(
                            "account sequence mismatch, expected {expected}, got {}: incorrect account sequence",
                            tx.sequence
                        ),
                        hash,
                    });
                }
                _ => {}
            }

            if let Err(err) = self.check_tx(&mut state, &tx) {
                return Ok(BroadcastResponse {
                    code: err.code,
                    log: err.log,
                    hash,
                });
            }

            state.broadcast_log.push((tx.sender, tx.sequence));
            state.mempool.push((hash, tx, tx_bytes.len()));
            matches!(fault, Some(BroadcastFault::AcceptAndHang))
        };

        if hang {
            std::future::pending::<()>().await;
        }

        Ok(BroadcastResponse {
            code: 0,
            log: String::new(),
            hash,
        })
    }

    async fn abci_query(&self, path: &str, data: &[u8]) -> Result<QueryResponse, RpcError> {
        let mut state = self.state.lock().await;
        state.query_calls += 1;
        if let Some(err) = state.query_faults.pop_front() {
            return Err(err);
        }
        if state.producing_blocks && !state.mempool.is_empty() {
            commit_block(&mut state);
        }

        let result = match path {
            APP_QUERY_PATH => self.handle_app_query(&state, data),
            SIMULATE_QUERY_PATH => match Tx::from_bytes(data) {
                Ok(tx) => {
                    let gas_used = gas_for(&tx, data.len());
                    let mut scratch = state.ledger.clone();
                    execute_msgs(&mut scratch, &state.wrapper_codes, &tx.msgs)
                        .and_then(|_| encode(&SimulateResponse { gas_used }))
                }
                Err(e) => Err(ExecError::new(CODE_TX_DECODE, e.to_string())),
            },
            other => Err(ExecError::new(
                CODE_INVALID_REQUEST,
                format!("unknown query path {other}"),
            )),
        };

        Ok(match result {
            Ok(value) => QueryResponse {
                code: 0,
                log: String::new(),
                value,
                height: state.height,
            },
            Err(err) => QueryResponse {
                code: err.code,
                log: err.log,
                value: Vec::new(),
                height: state.height,
            },
        })
    }

    async fn tx(&self, hash: &Hash) -> Result<Option<TxStatus>, RpcError> {
        let mut state = self.state.lock().await;
        state.tx_calls += 1;
        if let Some(err) = state.tx_faults.pop_front() {
            return Err(err);
        }
        if state.producing_blocks && !state.mempool.is_empty() {
            commit_block(&mut state);
        }
        Ok(state.results.get(hash).cloned())
    }
}
