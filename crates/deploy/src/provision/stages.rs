//! Stage markers for the type-state deployment chain.
//!
//! The order is fixed: Proxy -> Linked. A linked contract can only be chained
//! after the proxy it registers itself on.

use serde::{Deserialize, Serialize};

/// Marker for the proxied core contract stage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProxyStage;

/// Marker for contracts linked into the proxied contract.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinkedStage;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ProxyStage {}
    impl Sealed for super::LinkedStage {}
}

/// Marker trait for valid deployment stages.
pub trait DeploymentStage: sealed::Sealed + Default + Clone + Send + Sync + 'static {}

impl DeploymentStage for ProxyStage {}
impl DeploymentStage for LinkedStage {}

/// Valid stage transitions. Only `ProxyStage -> LinkedStage` exists.
pub trait NextStage: DeploymentStage {
    type Next: DeploymentStage;
}

impl NextStage for ProxyStage {
    type Next = LinkedStage;
}

// LinkedStage is terminal.
