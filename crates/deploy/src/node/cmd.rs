//! Command builder for Anvil.

/// Builder for Anvil arguments.
#[derive(Debug, Clone)]
pub struct AnvilCmdBuilder {
    host: String,
    port: u16,
    chain_id: u64,
    accounts: usize,
    balance_eth: Option<u128>,
    mnemonic: Option<String>,
    gas_limit: Option<u64>,
    block_time: Option<u64>,
    extra_args: Vec<String>,
}

impl AnvilCmdBuilder {
    pub fn new(chain_id: u64) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8545,
            chain_id,
            accounts: 10,
            balance_eth: None,
            mnemonic: None,
            gas_limit: None,
            block_time: None,
            extra_args: Vec::new(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Number of funded dev accounts.
    pub fn accounts(mut self, accounts: usize) -> Self {
        self.accounts = accounts;
        self
    }

    /// Balance of every dev account, in ether.
    pub fn balance_eth(mut self, balance: u128) -> Self {
        self.balance_eth = Some(balance);
        self
    }

    pub fn mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        self.mnemonic = Some(mnemonic.into());
        self
    }

    /// Block gas limit.
    pub fn gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Interval mining in seconds. Blocks are mined per transaction when unset.
    pub fn block_time(mut self, block_time: Option<u64>) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn extra_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Build the argument list.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![
            "--host".to_string(),
            self.host,
            "--port".to_string(),
            self.port.to_string(),
            "--chain-id".to_string(),
            self.chain_id.to_string(),
            "--accounts".to_string(),
            self.accounts.to_string(),
        ];

        if let Some(balance) = self.balance_eth {
            cmd.push("--balance".to_string());
            cmd.push(balance.to_string());
        }

        if let Some(mnemonic) = self.mnemonic {
            cmd.push("--mnemonic".to_string());
            cmd.push(mnemonic);
        }

        if let Some(gas_limit) = self.gas_limit {
            cmd.push("--gas-limit".to_string());
            cmd.push(gas_limit.to_string());
        }

        if let Some(block_time) = self.block_time {
            cmd.push("--block-time".to_string());
            cmd.push(block_time.to_string());
        }

        cmd.extend(self.extra_args);

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anvil_cmd_builder() {
        let cmd = AnvilCmdBuilder::new(31337)
            .port(8546)
            .accounts(200)
            .balance_eth(100_000_000)
            .mnemonic("test test test test test test test test test test test junk")
            .build();

        let flag = |name: &str| {
            cmd.iter()
                .position(|arg| arg == name)
                .map(|i| cmd[i + 1].as_str())
        };
        assert_eq!(flag("--chain-id"), Some("31337"));
        assert_eq!(flag("--port"), Some("8546"));
        assert_eq!(flag("--accounts"), Some("200"));
        assert_eq!(flag("--balance"), Some("100000000"));
        assert!(flag("--block-time").is_none());
    }
}
