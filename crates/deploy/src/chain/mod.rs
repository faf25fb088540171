//! Chain access used by the deployment steps.
//!
//! Steps only talk to the chain through [`ChainClient`]. [`RpcChain`] is the
//! JSON-RPC implementation; tests drive the pipeline with an in-memory chain.

mod rpc;
mod tx;

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U256};

pub use rpc::RpcChain;
pub use tx::LegacyTransaction;

use crate::error::Result;

/// A transaction the pipeline wants sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Human-readable description used in logs and errors, e.g. `Bank.initialize`.
    pub label: String,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
}

impl TxRequest {
    /// A contract creation carrying `input` as init code.
    pub fn create(label: impl Into<String>, from: Address, input: Bytes) -> Self {
        Self {
            label: label.into(),
            from,
            to: None,
            input,
            value: U256::ZERO,
        }
    }

    /// A call to `to` with `input` as calldata.
    pub fn call(label: impl Into<String>, from: Address, to: Address, input: Bytes) -> Self {
        Self {
            label: label.into(),
            from,
            to: Some(to),
            input,
            value: U256::ZERO,
        }
    }
}

/// A confirmed, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// Set for contract creations.
    pub contract_address: Option<Address>,
}

/// Minimal chain surface needed to provision contracts.
///
/// `send` only returns once the transaction is mined. A reverted transaction
/// is reported as [`crate::DeployError::Reverted`], never as a receipt.
pub trait ChainClient: Send + Sync {
    /// Chain ID of the connected network.
    fn chain_id(&self) -> u64;

    /// Accounts this client can sign for, in configuration order.
    fn signer_addresses(&self) -> Vec<Address>;

    fn balance(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Runtime code at `address`.
    fn code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Execute `tx` against the latest state without broadcasting it.
    fn simulate(&self, tx: &TxRequest) -> impl Future<Output = Result<Bytes>> + Send;

    /// Sign, broadcast and wait for `tx`.
    fn send(&self, tx: TxRequest) -> impl Future<Output = Result<TxReceipt>> + Send;
}
