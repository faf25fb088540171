//! Re-invocation policy of cross-contract registrations.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// How a registration call behaves when its step runs again.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LinkPolicy {
    /// Send the call on every run.
    #[default]
    Always,
    /// Skip when the same link was recorded, overwrite otherwise.
    IfChanged,
    /// Skip when the same link was recorded, refuse to replace a different one.
    Once,
}

/// Decision for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Send,
    Skip,
}

impl LinkPolicy {
    /// Decide what to do about linking `key` to `requested`, given the last recorded target.
    pub fn decide(
        self,
        key: Address,
        existing: Option<Address>,
        requested: Address,
    ) -> Result<LinkAction, DeployError> {
        match (self, existing) {
            (Self::Always, _) => Ok(LinkAction::Send),
            (_, Some(existing)) if existing == requested => Ok(LinkAction::Skip),
            (Self::IfChanged, _) | (Self::Once, None) => Ok(LinkAction::Send),
            (Self::Once, Some(existing)) => Err(DeployError::LinkConflict {
                key,
                existing,
                requested,
            }),
        }
    }
}
