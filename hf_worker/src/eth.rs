//! Ethereum JSON-RPC client.
//!
//! Transactions from the [`LocalSigner`] account, if one is configured, are signed in the worker
//! and sent with `eth_sendRawTransaction`. Any other account must be managed (unlocked) by the
//! node and goes through `eth_sendTransaction`.

use std::sync::atomic::{AtomicI64, Ordering};

use hodlerfc::config::WritePolicy;
use hodlerfc::model::{Address, TransactionReceipt};
use hodlerfc::ExternalError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use serde_with::de::DeserializeAsWrap;
use serde_with::serde_as;
use url::Url;
use worker::Delay;

use crate::signer::{LegacyTransaction, LocalSigner};
use crate::with::{HexBytes, HexQuantity};

/// Serializes as `[]`.
const NO_PARAMS: [(); 0] = [];

/// Call or transaction parameters (`eth_call`, `eth_estimateGas`, `eth_sendTransaction`).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CallRequest {
    /// Sender, required for transactions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Contract.
    pub to: Address,
    /// Calldata.
    #[serde_as(as = "HexBytes")]
    pub data: Vec<u8>,
    /// Gas limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<HexQuantity>")]
    pub gas: Option<u64>,
    /// Wei to send.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<HexQuantity>")]
    pub value: Option<u128>,
}
impl CallRequest {
    /// A read-only call to `to`.
    pub fn call(to: Address, data: Vec<u8>) -> Self {
        Self {
            from: None,
            to,
            data,
            gas: None,
            value: None,
        }
    }

    /// A transaction from `from` to `to`.
    pub fn transaction(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from: Some(from),
            ..Self::call(to, data)
        }
    }
}

/// `eth_getTransactionReceipt` result (the fields we use).
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    /// Transaction hash.
    pub transaction_hash: String,
    /// Block number.
    #[serde_as(as = "HexQuantity")]
    pub block_number: u64,
    /// Gas used.
    #[serde_as(as = "HexQuantity")]
    pub gas_used: u64,
    /// `1` success, `0` failure. Absent on pre-Byzantium chains.
    #[serde(default)]
    #[serde_as(as = "Option<HexQuantity>")]
    pub status: Option<u64>,
}
impl From<RpcReceipt> for TransactionReceipt {
    fn from(value: RpcReceipt) -> Self {
        Self {
            tx_hash: value.transaction_hash,
            block_number: value.block_number,
            gas_used: value.gas_used,
            success: value.status.map_or(true, |status| 1 == status),
        }
    }
}

/// JSON-RPC client for one node endpoint.
pub struct EthClient {
    client: Client,
    endpoint: Url,
    request_id: AtomicI64,
    signer: Option<LocalSigner>,
}
impl EthClient {
    /// Create a client for `endpoint`.
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            request_id: AtomicI64::new(0),
            signer: None,
        }
    }

    /// Sign transactions from `signer`'s account locally.
    pub fn with_signer(self, signer: LocalSigner) -> Self {
        Self {
            signer: Some(signer),
            ..self
        }
    }

    /// The locally signing account, if any.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(LocalSigner::address)
    }

    fn next_request_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn jrpc_call<T: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: &T,
    ) -> Result<R, ExternalError> {
        let request_json = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": method,
            "params": params,
        });
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&request_json)
            .send()
            .await
            .map_err(|e| ExternalError::new(format!("`{}` request failed: {}", method, e)))?;
        let val = resp
            .json()
            .await
            .map_err(|e| ExternalError::new(format!("`{}` response not JSON: {}", method, e)))?;
        let result = jsonrpc_result(val).map_err(|e| format!("`{}` failed: {}", method, e))?;
        serde_json::from_value(result)
            .map_err(|e| ExternalError::new(format!("`{}` result malformed: {}", method, e)))
    }

    /// `eth_call` against the latest block, returning the raw return data.
    pub async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, ExternalError> {
        let data: DeserializeAsWrap<Vec<u8>, HexBytes> =
            self.jrpc_call("eth_call", &(request, "latest")).await?;
        Ok(data.into_inner())
    }

    /// `eth_estimateGas`.
    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ExternalError> {
        let gas: DeserializeAsWrap<u64, HexQuantity> =
            self.jrpc_call("eth_estimateGas", &(request,)).await?;
        Ok(gas.into_inner())
    }

    /// `eth_sendTransaction`, returning the transaction hash.
    pub async fn send_transaction(&self, request: &CallRequest) -> Result<String, ExternalError> {
        self.jrpc_call("eth_sendTransaction", &(request,)).await
    }

    /// `eth_sendRawTransaction`, returning the transaction hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, ExternalError> {
        self.jrpc_call("eth_sendRawTransaction", &(format!("0x{}", hex::encode(raw)),))
            .await
    }

    /// `eth_getTransactionCount` including pending transactions.
    pub async fn transaction_count(&self, address: &Address) -> Result<u64, ExternalError> {
        let count: DeserializeAsWrap<u64, HexQuantity> = self
            .jrpc_call("eth_getTransactionCount", &(address, "pending"))
            .await?;
        Ok(count.into_inner())
    }

    /// `eth_gasPrice`, in wei.
    pub async fn gas_price(&self) -> Result<u128, ExternalError> {
        let price: DeserializeAsWrap<u128, HexQuantity> =
            self.jrpc_call("eth_gasPrice", &NO_PARAMS).await?;
        Ok(price.into_inner())
    }

    /// `eth_chainId`.
    pub async fn chain_id(&self) -> Result<u64, ExternalError> {
        let chain_id: DeserializeAsWrap<u64, HexQuantity> =
            self.jrpc_call("eth_chainId", &NO_PARAMS).await?;
        Ok(chain_id.into_inner())
    }

    /// `eth_getTransactionReceipt`. `None` while the transaction is pending.
    pub async fn transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<RpcReceipt>, ExternalError> {
        self.jrpc_call("eth_getTransactionReceipt", &(tx_hash,))
            .await
    }

    /// Estimate, buffer, send and wait for `request` to be mined, following `policy`.
    ///
    /// Once a transaction hash is obtained it is only ever re-polled, never re-sent, so a slow
    /// transaction cannot be submitted twice.
    pub async fn transact(
        &self,
        what: &str,
        request: CallRequest,
        policy: &WritePolicy,
    ) -> Result<TransactionReceipt, ExternalError> {
        let attempts = policy.attempts();
        let mut pending: Option<String> = None;
        let mut last_error = ExternalError::new("no attempts made");
        for attempt in 1..=attempts {
            if 1 < attempt {
                Delay::from(policy.retry_delay).await;
            }

            let tx_hash = match &pending {
                Some(tx_hash) => tx_hash.clone(),
                None => match self.send_buffered(&request, policy).await {
                    Ok(tx_hash) => {
                        log::info!("`{}` sent: {}.", what, tx_hash);
                        pending = Some(tx_hash.clone());
                        tx_hash
                    }
                    Err(e) => {
                        log::warn!("`{}` attempt {}/{} not sent: {}", what, attempt, attempts, e);
                        last_error = e;
                        continue;
                    }
                },
            };

            match self.wait_for_receipt(&tx_hash, policy).await {
                Ok(Some(receipt)) => return Ok(receipt.into()),
                Ok(None) => {
                    log::warn!(
                        "`{}` attempt {}/{}: {} not mined after {} polls.",
                        what,
                        attempt,
                        attempts,
                        tx_hash,
                        policy.receipt_poll_attempts
                    );
                    last_error = format!("{} not mined", tx_hash).into();
                }
                Err(e) => {
                    log::warn!("`{}` attempt {}/{} receipt poll failed: {}", what, attempt, attempts, e);
                    last_error = e;
                }
            }
        }
        Err(format!("gave up after {} attempts: {}", attempts, last_error).into())
    }

    async fn send_buffered(
        &self,
        request: &CallRequest,
        policy: &WritePolicy,
    ) -> Result<String, ExternalError> {
        let estimate = self.estimate_gas(request).await?;
        let gas = policy.gas_limit(estimate);
        match &self.signer {
            Some(signer) if request.from == Some(signer.address()) => {
                self.send_signed(signer, request, gas).await
            }
            _ => {
                let request = CallRequest {
                    gas: Some(gas),
                    ..request.clone()
                };
                self.send_transaction(&request).await
            }
        }
    }

    async fn send_signed(
        &self,
        signer: &LocalSigner,
        request: &CallRequest,
        gas: u64,
    ) -> Result<String, ExternalError> {
        let tx = LegacyTransaction {
            nonce: self.transaction_count(&signer.address()).await?,
            gas_price: self.gas_price().await?,
            gas,
            to: request.to,
            value: request.value.unwrap_or(0),
            data: request.data.clone(),
        };
        let chain_id = self.chain_id().await?;
        log::debug!("Signing {:?} for chain {}.", tx, chain_id);
        let raw = signer.sign(&tx, chain_id)?;
        self.send_raw_transaction(&raw).await
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        policy: &WritePolicy,
    ) -> Result<Option<RpcReceipt>, ExternalError> {
        for poll in 0..policy.receipt_poll_attempts {
            if 0 < poll {
                Delay::from(policy.receipt_poll_interval).await;
            }
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                return Ok(Some(receipt));
            }
        }
        Ok(None)
    }
}

/// Unwrap a JSON-RPC response envelope.
fn jsonrpc_result(val: Value) -> Result<Value, String> {
    if let Some(err) = val.get("error") {
        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return Err(format!("RPC error {}: {}", code, message));
    }
    match val {
        Value::Object(mut obj) => obj
            .remove("result")
            .ok_or_else(|| "Missing result field".to_owned()),
        other => Err(format!("Response is not an object: {}", other)),
    }
}
