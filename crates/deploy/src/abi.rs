//! Solidity bindings for the handful of entry points the pipeline invokes.

use alloy_core::{
    primitives::Bytes,
    sol,
    sol_types::{SolError, decode_revert_reason},
};

sol! {
    /// Entry points of `Bank` reached through its proxy.
    interface IBank {
        function initialize(address creditToken) external;
        function setStakingReward(address gameToken, address stakingRewards) external;
    }

    contract StakingRewards {
        constructor(address rewardsDistribution, address rewardsToken, address bank) {}
    }

    contract TransparentUpgradeableProxy {
        constructor(address logic, address admin, bytes data) {}
    }

    /// Raised by OpenZeppelin 5's `Initializable` on a second initialization.
    error InvalidInitialization();
}

/// Revert string of OpenZeppelin 4's `Initializable`.
const ALREADY_INITIALIZED_REASON: &str = "already initialized";

/// Creation code followed by the ABI-encoded constructor arguments.
pub fn encode_deploy(bytecode: &Bytes, args: &[u8]) -> Bytes {
    let mut data = Vec::with_capacity(bytecode.len() + args.len());
    data.extend_from_slice(bytecode);
    data.extend_from_slice(args);
    data.into()
}

/// Decode an `Error(string)` / `Panic(uint256)` payload into a readable reason.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    decode_revert_reason(data)
}

/// Whether a revert means the initializer already ran.
pub fn is_already_initialized(reason: &str, data: &[u8]) -> bool {
    data.starts_with(&InvalidInitialization::SELECTOR)
        || reason.to_ascii_lowercase().contains(ALREADY_INITIALIZED_REASON)
}
