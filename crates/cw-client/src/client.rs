//! High-level client
//!
//! Every transaction goes build → broadcast → wait. The per-account lock is
//! held only for build and broadcast; waiting for confirmation happens after
//! it is released, so a sender can pipeline transactions.

use crate::cancel::Cancellation;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;
use crate::sequence::{AccountGuard, SequenceTracker};
use crate::transport::{Broadcast, HttpRpc, NodeRpc, RpcTransport};
use crate::tx_builder::{AccountSnapshot, TxBuilder};
use crate::waiter::{ConfirmationWaiter, TransactionResult};
use cw_crypto::Signer;
use cw_types::{
    query::{AccountResponse, CodeResponse, ContractInfo, InfoResponse},
    Addr, AdminOption, Binary, Coin, Coins, Hash, Message, MsgOutcome, QueryRequest,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Who signs, and how
#[derive(Clone)]
pub struct SigningOptions {
    pub sender: Addr,
    pub signer: Arc<dyn Signer>,
    /// Explicit gas limit; simulated when unset
    pub gas_limit: Option<u64>,
    pub memo: String,
    /// Bound on the broadcast call; defaults to the configured request
    /// timeout
    pub broadcast_timeout: Option<Duration>,
    /// Overrides the configured confirmation timeout
    pub confirm_timeout: Option<Duration>,
}

impl SigningOptions {
    pub fn new(sender: Addr, signer: Arc<dyn Signer>) -> Self {
        Self {
            sender,
            signer,
            gas_limit: None,
            memo: String::new(),
            broadcast_timeout: None,
            confirm_timeout: None,
        }
    }

    /// Skip simulation and use this gas limit
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// How long to wait for CheckTx before reporting the outcome as unknown
    pub fn broadcast_timeout(mut self, timeout: Duration) -> Self {
        self.broadcast_timeout = Some(timeout);
        self
    }

    /// How long to poll for inclusion before returning `Pending`
    pub fn confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = Some(timeout);
        self
    }
}

struct Inner {
    transport: RpcTransport,
    waiter: ConfirmationWaiter,
    sequences: SequenceTracker,
    config: ClientConfig,
    chain_id: String,
}

/// Handle to a node. Clones share sequence state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
    cancel: Cancellation,
}

impl Client {
    /// Connect over HTTP JSON-RPC and learn the chain ID
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let rpc = HttpRpc::new(&config.endpoint, config.request_timeout())?;
        Self::with_rpc(Arc::new(rpc), config).await
    }

    /// Build on any [`NodeRpc`], such as the in-memory mock
    pub async fn with_rpc(rpc: Arc<dyn NodeRpc>, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = RpcTransport::new(rpc, RetryPolicy::from_config(&config));
        let info: InfoResponse = transport
            .query_app(&QueryRequest::Info {}, &Cancellation::never())
            .await?;

        if let Some(configured) = &config.chain_id {
            if *configured != info.chain_id {
                return Err(ClientError::ChainIdMismatch {
                    configured: configured.clone(),
                    reported: info.chain_id,
                });
            }
        }

        info!(
            endpoint = %config.endpoint,
            chain_id = %info.chain_id,
            height = info.last_finalized_block.height,
            "Connected to node"
        );

        let waiter = ConfirmationWaiter::new(transport.clone(), config.poll_interval());
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                waiter,
                sequences: SequenceTracker::new(),
                config,
                chain_id: info.chain_id,
            }),
            cancel: Cancellation::never(),
        })
    }

    /// A handle whose operations abort when `cancel` fires
    pub fn with_cancellation(&self, cancel: Cancellation) -> Self {
        Self {
            inner: self.inner.clone(),
            cancel,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.inner.chain_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn sequences(&self) -> &SequenceTracker {
        &self.inner.sequences
    }

    async fn query<T: DeserializeOwned>(&self, request: QueryRequest) -> Result<T> {
        self.inner.transport.query_app(&request, &self.cancel).await
    }

    pub async fn query_info(&self) -> Result<InfoResponse> {
        self.query(QueryRequest::Info {}).await
    }

    pub async fn query_account(&self, address: &Addr) -> Result<AccountResponse> {
        self.query(QueryRequest::Account { address: *address }).await
    }

    pub async fn query_balance(&self, address: &Addr, denom: &str) -> Result<Coin> {
        self.query(QueryRequest::Balance {
            address: *address,
            denom: denom.to_string(),
        })
        .await
    }

    /// All balances, sorted by denom with no duplicates or zero amounts
    pub async fn query_balances(&self, address: &Addr) -> Result<Coins> {
        self.query(QueryRequest::Balances { address: *address })
            .await
    }

    pub async fn query_code(&self, hash: &Hash) -> Result<CodeResponse> {
        self.query(QueryRequest::Code { hash: *hash }).await
    }

    pub async fn query_contract(&self, address: &Addr) -> Result<ContractInfo> {
        self.query(QueryRequest::Contract { address: *address })
            .await
    }

    pub async fn query_wasm_smart<T: DeserializeOwned>(
        &self,
        contract: &Addr,
        msg: Value,
    ) -> Result<T> {
        self.query(QueryRequest::WasmSmart {
            contract: *contract,
            msg,
        })
        .await
    }

    /// Gas the node estimates for `msgs`, unadjusted
    pub async fn simulate(&self, msgs: Vec<Message>, opts: &SigningOptions) -> Result<u64> {
        let account = self.query_account(&opts.sender).await?;
        let snapshot = AccountSnapshot {
            address: opts.sender,
            sequence: account.sequence,
            chain_id: self.inner.chain_id.clone(),
        };
        let unsigned = self.builder(msgs, opts).build_unsigned(
            &snapshot,
            opts.signer.public_key().to_pubkey(),
            self.inner.config.max_gas_limit,
        )?;
        self.inner.transport.simulate(&unsigned, &self.cancel).await
    }

    fn builder(&self, msgs: Vec<Message>, opts: &SigningOptions) -> TxBuilder {
        TxBuilder::new()
            .add_messages(msgs)
            .memo(opts.memo.clone())
            .max_tx_bytes(self.inner.config.max_tx_bytes)
    }

    async fn refresh_account(
        &self,
        guard: &mut AccountGuard,
        hint: Option<u64>,
    ) -> Result<AccountSnapshot> {
        let account = self.query_account(guard.address()).await?;
        // The node's mismatch report can be ahead of committed state when
        // our own transactions are still in its mempool
        let sequence = hint.map_or(account.sequence, |h| h.max(account.sequence));
        guard.set_known(sequence, self.inner.chain_id.clone());
        Ok(AccountSnapshot {
            address: *guard.address(),
            sequence,
            chain_id: self.inner.chain_id.clone(),
        })
    }

    async fn gas_limit_for(
        &self,
        builder: &TxBuilder,
        account: &AccountSnapshot,
        opts: &SigningOptions,
    ) -> Result<u64> {
        if let Some(limit) = opts.gas_limit {
            return Ok(limit);
        }

        let config = &self.inner.config;
        let unsigned = builder.build_unsigned(
            account,
            opts.signer.public_key().to_pubkey(),
            config.max_gas_limit,
        )?;
        match self.inner.transport.simulate(&unsigned, &self.cancel).await {
            Ok(gas_used) => {
                let adjusted = (gas_used as f64 * config.gas_adjustment).ceil() as u64;
                Ok(adjusted.clamp(config.min_gas_limit, config.max_gas_limit))
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = config.default_gas_limit,
                    "Gas simulation failed; using default gas limit"
                );
                Ok(config.default_gas_limit)
            }
        }
    }

    /// Sign and broadcast without waiting for inclusion
    ///
    /// A sequence mismatch triggers one refresh and retry; a second mismatch
    /// is returned. Ambiguous transport failures are never retried.
    #[instrument(skip_all, fields(sender = %opts.sender))]
    pub async fn broadcast_msgs(
        &self,
        msgs: Vec<Message>,
        opts: &SigningOptions,
    ) -> Result<Broadcast> {
        let builder = self.builder(msgs, opts);
        builder.validate(&opts.sender)?;

        let timeout = opts
            .broadcast_timeout
            .unwrap_or_else(|| self.inner.config.request_timeout());
        let mut guard = self.inner.sequences.lock(&opts.sender).await;
        let mut hint = None;
        let mut retried = false;

        loop {
            let account = match guard.snapshot() {
                Some(account) => account,
                None => self.refresh_account(&mut guard, hint).await?,
            };
            let gas_limit = self.gas_limit_for(&builder, &account, opts).await?;
            let fee = self.inner.config.gas_price.fee_for(gas_limit)?;
            let signed = builder
                .clone()
                .fee(fee)
                .build(&account, opts.signer.as_ref())?;

            match self
                .inner
                .transport
                .broadcast(&signed, timeout, &self.cancel)
                .await
            {
                Ok(outcome) => {
                    guard.advance();
                    return Ok(outcome);
                }
                Err(ClientError::SequenceMismatch { expected, got }) => {
                    guard.invalidate();
                    if retried {
                        warn!(sent = got, ?expected, "Sequence mismatch after refresh");
                        return Err(ClientError::SequenceMismatch { expected, got });
                    }
                    warn!(sent = got, ?expected, "Sequence mismatch; refreshing once");
                    retried = true;
                    hint = expected;
                }
                Err(e) => {
                    // CheckTx rejections and requests that never left leave
                    // the sequence unused
                    if e.reached_node() && !matches!(e, ClientError::Rejected { .. }) {
                        guard.invalidate();
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Broadcast then wait for the outcome. Execution failures come back as
    /// [`TransactionResult::Failed`], not as errors.
    pub async fn submit(
        &self,
        msgs: Vec<Message>,
        opts: &SigningOptions,
    ) -> Result<TransactionResult> {
        let broadcast = self.broadcast_msgs(msgs, opts).await?;
        let timeout = opts
            .confirm_timeout
            .unwrap_or_else(|| self.inner.config.confirm_timeout());
        self.await_confirmation(&broadcast.hash(), timeout).await
    }

    /// Poll for a transaction; resumable after an earlier `Pending`
    pub async fn await_confirmation(
        &self,
        hash: &Hash,
        timeout: Duration,
    ) -> Result<TransactionResult> {
        self.inner
            .waiter
            .await_confirmation(hash, timeout, &self.cancel)
            .await
    }

    /// Send coins. Returns `Included` or `Pending`; execution failures are
    /// errors carrying the node's code and log.
    #[instrument(skip_all, fields(to = %to, coins = %coins))]
    pub async fn transfer(
        &self,
        to: &Addr,
        coins: Coins,
        opts: &SigningOptions,
    ) -> Result<TransactionResult> {
        let msgs = vec![Message::transfer(opts.sender, *to, coins)];
        self.submit(msgs, opts).await?.into_result()
    }

    /// Upload wasm code, returning its hash
    pub async fn store_code(
        &self,
        wasm_byte_code: impl Into<Binary>,
        opts: &SigningOptions,
    ) -> Result<(Hash, TransactionResult)> {
        let wasm_byte_code = wasm_byte_code.into();
        let code_hash = Hash::of(&wasm_byte_code);
        let msgs = vec![Message::store_code(opts.sender, wasm_byte_code)];
        let result = self.submit(msgs.clone(), opts).await?.into_result()?;
        check_outcomes(&result, &msgs)?;
        Ok((code_hash, result))
    }

    /// Create a contract from stored code. The address is derived locally
    /// and checked against the node's events once included.
    pub async fn instantiate(
        &self,
        code_hash: Hash,
        msg: Value,
        salt: impl Into<Binary>,
        funds: Coins,
        admin: AdminOption,
        opts: &SigningOptions,
    ) -> Result<(Addr, TransactionResult)> {
        let salt = salt.into();
        let address = Addr::compute(&opts.sender, &code_hash, &salt);
        let msgs = vec![Message::instantiate(
            opts.sender,
            code_hash,
            msg,
            salt,
            funds,
            admin.decide(&address),
        )];
        let result = self.submit(msgs.clone(), opts).await?.into_result()?;
        check_outcomes(&result, &msgs)?;
        Ok((address, result))
    }

    /// Upload and instantiate in one transaction
    #[instrument(skip_all, fields(sender = %opts.sender))]
    pub async fn store_code_and_instantiate(
        &self,
        wasm_byte_code: impl Into<Binary>,
        msg: Value,
        salt: impl Into<Binary>,
        funds: Coins,
        admin: AdminOption,
        opts: &SigningOptions,
    ) -> Result<(Addr, TransactionResult)> {
        let wasm_byte_code = wasm_byte_code.into();
        let salt = salt.into();
        let code_hash = Hash::of(&wasm_byte_code);
        let address = Addr::compute(&opts.sender, &code_hash, &salt);

        let msgs = vec![
            Message::store_code(opts.sender, wasm_byte_code),
            Message::instantiate(
                opts.sender,
                code_hash,
                msg,
                salt,
                funds,
                admin.decide(&address),
            ),
        ];
        let result = self.submit(msgs.clone(), opts).await?.into_result()?;
        check_outcomes(&result, &msgs)?;

        info!(
            contract = %address,
            hash = %result.hash(),
            pending = result.is_pending(),
            "Contract deployed"
        );
        Ok((address, result))
    }

    /// Call a contract's execute entry point, attaching `funds`
    pub async fn execute(
        &self,
        contract: &Addr,
        msg: Value,
        funds: Coins,
        opts: &SigningOptions,
    ) -> Result<TransactionResult> {
        let msgs = vec![Message::execute(opts.sender, *contract, msg, funds)];
        self.submit(msgs, opts).await?.into_result()
    }

    /// Move a contract to new code. Only its admin may do this.
    pub async fn migrate(
        &self,
        contract: &Addr,
        new_code_hash: Hash,
        msg: Value,
        opts: &SigningOptions,
    ) -> Result<TransactionResult> {
        let msgs = vec![Message::migrate(opts.sender, *contract, new_code_hash, msg)];
        self.submit(msgs, opts).await?.into_result()
    }
}

// Included transactions must carry the events their messages promise
fn check_outcomes(result: &TransactionResult, msgs: &[Message]) -> Result<()> {
    for (msg, outcome) in msgs.iter().zip(result.outcomes(msgs)) {
        let reason = match outcome {
            MsgOutcome::CodeStored { code_hash: None } => {
                "no store_code event for the uploaded code"
            }
            MsgOutcome::Instantiated { contract: None } => {
                "no instantiate event for the derived contract address"
            }
            _ => continue,
        };
        return Err(ClientError::UnexpectedEvents {
            hash: result.hash(),
            reason: format!("{} message: {reason}", msg.kind()),
        });
    }
    Ok(())
}
