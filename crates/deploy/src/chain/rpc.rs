//! JSON-RPC chain client.

use std::time::{Duration, Instant};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use url::Url;

use super::{ChainClient, LegacyTransaction, TxReceipt, TxRequest, tx::SignedTransaction};
use crate::{
    abi,
    config::NetworkConfig,
    error::{ConfigError, DeployError, Result},
    signer::Signers,
};

/// Timeout of a single HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Retries of a transient failure before giving up.
const MAX_RETRIES: usize = 5;

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: String,
    gas_used: String,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    status: Option<String>,
}

/// A network reached over JSON-RPC, signing locally with the network's keys.
#[derive(Debug, Clone)]
pub struct RpcChain {
    network: String,
    url: Url,
    http: reqwest::Client,
    chain_id: u64,
    signers: Signers,
    gas: Option<u64>,
    gas_price: Option<u128>,
    timeout: Duration,
}

impl RpcChain {
    /// Connect to `network` and check that the endpoint serves the configured chain.
    pub async fn connect(network: &str, config: &NetworkConfig, signers: Signers) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| DeployError::Transport {
                method: "connect".to_string(),
                source,
            })?;

        let mut chain = Self {
            network: network.to_string(),
            url: config.url.clone(),
            http,
            chain_id: 0,
            signers,
            gas: config.gas,
            gas_price: config.gas_price,
            timeout: config.timeout(),
        };

        let actual = chain.quantity("eth_chainId", json!([])).await?;
        let actual = u64::try_from(actual).map_err(|e| DeployError::Decode {
            method: "eth_chainId".to_string(),
            reason: e.to_string(),
        })?;
        if let Some(expected) = config.chain_id.filter(|expected| *expected != actual) {
            return Err(ConfigError::ChainIdMismatch {
                network: network.to_string(),
                expected,
                actual,
            }
            .into());
        }
        chain.chain_id = actual;

        tracing::info!(network, chain_id = actual, url = %chain.url, "Connected to network");
        Ok(chain)
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Perform a JSON-RPC call, retrying transient failures.
    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        (|| self.request_once(method, &params))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(250))
                    .with_max_times(MAX_RETRIES),
            )
            .when(DeployError::is_transient)
            .notify(|err: &DeployError, delay: Duration| {
                tracing::warn!(method, error = %err, ?delay, "RPC request failed, retrying");
            })
            .await
    }

    async fn request_once<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        let transport = |source| DeployError::Transport {
            method: method.to_string(),
            source,
        };

        let response = self
            .http
            .post(self.url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?;

        let body: JsonRpcResponse = response.json().await.map_err(transport)?;

        if let Some(error) = body.error {
            return Err(DeployError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
                data: error.data.as_ref().and_then(revert_data),
            });
        }

        let result = body.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| DeployError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128> {
        let value: String = self.request(method, params).await?;
        parse_quantity(method, &value)
    }

    /// Run a call, turning execution failures into [`DeployError::Reverted`].
    async fn call_at(&self, tx: &TxRequest, block: Value) -> Result<Bytes> {
        self.request("eth_call", json!([call_object(tx), block]))
            .await
            .map_err(|err| into_revert(&tx.label, err))
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        let value: String = self
            .request("eth_estimateGas", json!([call_object(tx)]))
            .await
            .map_err(|err| into_revert(&tx.label, err))?;
        let gas = parse_quantity("eth_estimateGas", &value)?;
        u64::try_from(gas).map_err(|e| DeployError::Decode {
            method: "eth_estimateGas".to_string(),
            reason: e.to_string(),
        })
    }

    async fn broadcast(&self, label: &str, signed: &SignedTransaction) -> Result<()> {
        match self
            .request::<B256>("eth_sendRawTransaction", json!([signed.raw]))
            .await
        {
            Ok(_) => Ok(()),
            // A retried broadcast may find its own transaction already in the pool.
            Err(DeployError::Rpc { message, .. })
                if message.to_ascii_lowercase().contains("already known") =>
            {
                tracing::debug!(label, hash = %signed.hash, "Transaction already known");
                Ok(())
            }
            Err(err) => Err(into_revert(label, err)),
        }
    }

    async fn wait_for_receipt(&self, tx: &TxRequest, hash: B256) -> Result<TxReceipt> {
        let start = Instant::now();

        loop {
            let receipt: Option<RpcReceipt> = self
                .request("eth_getTransactionReceipt", json!([hash]))
                .await?;

            if let Some(receipt) = receipt {
                let block_number =
                    parse_quantity("eth_getTransactionReceipt", &receipt.block_number)?;
                let gas_used = parse_quantity("eth_getTransactionReceipt", &receipt.gas_used)?;

                if receipt.status.as_deref() == Some("0x0") {
                    return Err(self.replay_failure(tx, &receipt.block_number).await);
                }

                return Ok(TxReceipt {
                    transaction_hash: receipt.transaction_hash,
                    block_number: block_number as u64,
                    gas_used: gas_used as u64,
                    contract_address: receipt.contract_address,
                });
            }

            if start.elapsed() > self.timeout {
                return Err(DeployError::Timeout {
                    tx_hash: hash,
                    timeout: self.timeout,
                });
            }

            tracing::trace!(label = %tx.label, %hash, "Waiting for receipt");
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// Recover the revert reason of a mined failure by replaying it at its block.
    async fn replay_failure(&self, tx: &TxRequest, block: &str) -> DeployError {
        match self.call_at(tx, json!(block)).await {
            Err(err @ DeployError::Reverted { .. }) => err,
            _ => DeployError::Reverted {
                method: tx.label.clone(),
                reason: "transaction reverted without a reason".to_string(),
                data: Bytes::new(),
            },
        }
    }
}

impl ChainClient for RpcChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn signer_addresses(&self) -> Vec<Address> {
        self.signers.addresses()
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        self.request("eth_getBalance", json!([account, "latest"]))
            .await
    }

    async fn code(&self, address: Address) -> Result<Bytes> {
        self.request("eth_getCode", json!([address, "latest"])).await
    }

    async fn simulate(&self, tx: &TxRequest) -> Result<Bytes> {
        self.call_at(tx, json!("latest")).await
    }

    async fn send(&self, tx: TxRequest) -> Result<TxReceipt> {
        let key = self
            .signers
            .get(tx.from)
            .ok_or(ConfigError::UnknownSigner(tx.from))?;

        // Estimating first surfaces reverts before anything is broadcast.
        let estimate = self.estimate_gas(&tx).await?;
        let gas_limit = self.gas.unwrap_or(estimate.saturating_mul(6) / 5);
        let gas_price = match self.gas_price {
            Some(price) => price,
            None => self.quantity("eth_gasPrice", json!([])).await?,
        };

        let required = U256::from(gas_limit) * U256::from(gas_price) + tx.value;
        let available = self.balance(tx.from).await?;
        if available < required {
            return Err(DeployError::InsufficientFunds {
                account: tx.from,
                required,
                available,
            });
        }

        let nonce = self
            .quantity("eth_getTransactionCount", json!([tx.from, "pending"]))
            .await? as u64;

        let signed = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: tx.to,
            value: tx.value,
            input: tx.input.clone(),
            chain_id: self.chain_id,
        }
        .sign(key)?;

        tracing::info!(
            network = %self.network,
            label = %tx.label,
            hash = %signed.hash,
            nonce,
            gas_limit,
            "Sending transaction"
        );
        self.broadcast(&tx.label, &signed).await?;

        let receipt = self.wait_for_receipt(&tx, signed.hash).await?;
        tracing::info!(
            label = %tx.label,
            hash = %receipt.transaction_hash,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}

fn call_object(tx: &TxRequest) -> Value {
    let mut call = json!({
        "from": tx.from,
        "data": tx.input,
        "value": format!("{:#x}", tx.value),
    });
    if let Some(to) = tx.to {
        call["to"] = json!(to);
    }
    call
}

/// Parse a hex quantity such as `0x1a`.
fn parse_quantity(method: &str, value: &str) -> Result<u128> {
    u128::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|e| DeployError::Decode {
        method: method.to_string(),
        reason: format!("invalid quantity `{value}`: {e}"),
    })
}

/// Revert payload of a JSON-RPC error.
///
/// Nodes either put the hex payload directly in `data` or nest it one level
/// deeper, as in `{"data": {"data": "0x.."}}`.
fn revert_data(data: &Value) -> Option<Bytes> {
    match data {
        Value::String(hex) => hex.parse().ok(),
        Value::Object(map) => map.get("data").and_then(revert_data),
        _ => None,
    }
}

/// Map an execution error of `label` to [`DeployError::Reverted`].
fn into_revert(label: &str, err: DeployError) -> DeployError {
    match err {
        DeployError::Rpc {
            message, data, ..
        } if data.is_some() || message.to_ascii_lowercase().contains("revert") => {
            let data = data.unwrap_or_default();
            let reason = abi::decode_revert(&data).unwrap_or(message);
            DeployError::Reverted {
                method: label.to_string(),
                reason,
                data,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::sol_types::SolError;

    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("eth_chainId", "0x7a69").unwrap(), 31337);
        assert_eq!(parse_quantity("eth_chainId", "0x6357d2e0").unwrap(), 1666600000);
        assert!(parse_quantity("eth_chainId", "0xzz").is_err());
    }

    #[test]
    fn test_revert_data_shapes() {
        assert_eq!(
            revert_data(&json!("0x08c379a0")),
            Some(Bytes::from_static(&[0x08, 0xc3, 0x79, 0xa0]))
        );
        assert_eq!(
            revert_data(&json!({ "data": "0x01" })),
            Some(Bytes::from_static(&[0x01]))
        );
        assert_eq!(revert_data(&json!("Reverted")), None);
    }

    #[test]
    fn test_execution_errors_become_reverts() {
        let data = alloy_core::sol_types::Revert {
            reason: "Ownable: caller is not the owner".to_string(),
        }
        .abi_encode();

        let err = into_revert(
            "Bank.setStakingReward",
            DeployError::Rpc {
                method: "eth_estimateGas".to_string(),
                code: 3,
                message: "execution reverted".to_string(),
                data: Some(data.into()),
            },
        );
        assert!(matches!(
            err,
            DeployError::Reverted { method, reason, .. }
                if method == "Bank.setStakingReward" && reason == "Ownable: caller is not the owner"
        ));

        let err = into_revert(
            "Bank.initialize",
            DeployError::Rpc {
                method: "eth_sendRawTransaction".to_string(),
                code: -32000,
                message: "nonce too low".to_string(),
                data: None,
            },
        );
        assert!(matches!(err, DeployError::Rpc { .. }));
    }

    #[test]
    fn test_call_object_omits_recipient_for_creation() {
        let create = TxRequest::create("Bank", Address::repeat_byte(1), Bytes::from_static(&[0x60]));
        let call = call_object(&create);
        assert!(call.get("to").is_none());
        assert_eq!(call["data"], json!("0x60"));
        assert_eq!(call["value"], json!("0x0"));

        let tx = TxRequest::call("Bank.initialize", Address::ZERO, Address::repeat_byte(2), Bytes::new());
        assert!(call_object(&tx).get("to").is_some());
    }
}
