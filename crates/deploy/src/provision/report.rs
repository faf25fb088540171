//! What a run did.

use alloy_core::primitives::{Address, B256};

/// Effect of a single action within a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A contract was deployed by this run.
    Deployed {
        name: String,
        address: Address,
        transaction_hash: B256,
    },
    /// A recorded deployment was verified and kept.
    Reused { name: String, address: Address },
    /// A state-changing call was sent.
    Executed { label: String, transaction_hash: B256 },
    /// A call was not needed.
    Skipped { label: String, reason: String },
}

impl Outcome {
    pub fn sent_transaction(&self) -> bool {
        matches!(self, Self::Deployed { .. } | Self::Executed { .. })
    }
}

/// Outcomes of one step, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub tag: &'static str,
    pub outcomes: Vec<Outcome>,
}

impl StepReport {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn transactions(&self) -> usize {
        self.outcomes.iter().filter(|o| o.sent_transaction()).count()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub network: String,
    pub chain_id: u64,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn transactions(&self) -> usize {
        self.steps.iter().map(StepReport::transactions).sum()
    }
}
