//! Explicit deployment state machine.
//!
//! Every logical contract moves through `absent -> deployed -> initialized`.
//! Provisioners request a target state; reaching a state that was already
//! reached is a no-op, anything else that is not the next state is rejected.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// Where a logical contract stands on a network.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Absent,
    Deployed,
    Initialized,
}

/// What a requested transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The target was already reached.
    Noop,
    /// The state moved one step forward.
    Advanced,
}

impl Lifecycle {
    fn rank(self) -> u8 {
        match self {
            Self::Absent => 0,
            Self::Deployed => 1,
            Self::Initialized => 2,
        }
    }

    /// Check the move from `self` to `target`.
    pub fn transition(self, contract: &str, target: Lifecycle) -> Result<Transition, DeployError> {
        if self == target {
            return Ok(Transition::Noop);
        }
        if target.rank() == self.rank() + 1 {
            return Ok(Transition::Advanced);
        }
        Err(DeployError::InvalidTransition {
            contract: contract.to_string(),
            from: self,
            to: target,
        })
    }
}

/// A cross-contract registration performed by a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Contract holding the mapping.
    pub contract: String,
    pub key: Address,
    pub target: Address,
}

/// Per-network progress: contract states and registered links.
///
/// Kept apart from the deployment records, which are written once and never
/// modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(default)]
    contracts: std::collections::BTreeMap<String, Lifecycle>,
    #[serde(default)]
    links: Vec<Link>,
}

impl Journal {
    pub fn state(&self, contract: &str) -> Lifecycle {
        self.contracts.get(contract).copied().unwrap_or_default()
    }

    /// Apply a guarded transition.
    pub fn advance(&mut self, contract: &str, target: Lifecycle) -> Result<Transition, DeployError> {
        let transition = self.state(contract).transition(contract, target)?;
        if transition == Transition::Advanced {
            self.contracts.insert(contract.to_string(), target);
        }
        Ok(transition)
    }

    /// Drop everything known about `contract`, including links it holds.
    pub fn forget(&mut self, contract: &str) {
        self.contracts.remove(contract);
        self.links.retain(|link| link.contract != contract);
    }

    pub fn link(&self, contract: &str, key: Address) -> Option<Address> {
        self.links
            .iter()
            .find(|link| link.contract == contract && link.key == key)
            .map(|link| link.target)
    }

    pub fn set_link(&mut self, contract: &str, key: Address, target: Address) {
        match self
            .links
            .iter_mut()
            .find(|link| link.contract == contract && link.key == key)
        {
            Some(link) => link.target = target,
            None => self.links.push(Link {
                contract: contract.to_string(),
                key,
                target,
            }),
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }
}
