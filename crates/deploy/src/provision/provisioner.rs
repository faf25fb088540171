//! Core provisioner trait.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use super::{context::DeployContext, report::StepReport, stages::DeploymentStage};
use crate::{accounts::Role, chain::ChainClient, error::Result};

/// One deployment step.
///
/// A provisioner is plain configuration. [`Provisioner::provision`] brings the
/// chain to the state the step describes, reusing whatever previous runs
/// already recorded, and is safe to call any number of times.
///
/// # Type Parameters
/// - `Stage`: where in the chain this step may appear
pub trait Provisioner: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The deployment stage this step belongs to.
    type Stage: DeploymentStage;

    /// Tag selecting this step on the command line.
    const TAG: &'static str;

    /// Named accounts the step needs, resolved before any transaction.
    const REQUIRED_ROLES: &'static [Role];

    /// Artifact names the step deploys.
    fn artifacts(&self) -> Vec<String>;

    /// Run the step.
    fn provision<C: ChainClient>(
        &self,
        ctx: &mut DeployContext<'_, C>,
    ) -> impl Future<Output = Result<StepReport>> + Send;
}
