//! Recursive deployer chain type.

use serde::{Deserialize, Serialize};

use super::provisioner::Provisioner;
use super::stages::NextStage;

/// Terminal marker for the end of a deployer chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct End;

/// A node in the deployment chain.
///
/// `S` is the step to run, `Next` is the rest of the chain.
/// The chain encodes deployment order through the type system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "S: Provisioner, Next: Serialize + serde::de::DeserializeOwned")]
pub struct Deployer<S, Next = End>
where
    S: Provisioner,
{
    /// The step configuration for this stage.
    pub step: S,
    /// The rest of the deployment chain.
    pub next: Next,
}

impl<S> Deployer<S, End>
where
    S: Provisioner,
{
    /// Create a chain with a single step.
    pub fn new(step: S) -> Self {
        Self { step, next: End }
    }

    /// Chain another step after this one.
    ///
    /// The next step must belong to a valid subsequent stage.
    pub fn then<S2>(self, step: S2) -> Deployer<S, Deployer<S2, End>>
    where
        S2: Provisioner,
        S::Stage: NextStage<Next = S2::Stage>,
    {
        Deployer {
            step: self.step,
            next: Deployer::new(step),
        }
    }
}
