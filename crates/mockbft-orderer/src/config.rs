use std::{
    net::SocketAddr,
    time::Duration,
};

use serde::{
    Deserialize,
    Serialize,
};

/// Configuration for one orderer instance.
///
/// There is no CLI; embedding hosts construct this and hand it to the
/// builder. The defaults mirror the engine being mocked: the standard RPC
/// port and a one second block interval. Sub-millisecond intervals are
/// supported for benchmark runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address the JSON-RPC server listens on.
    pub listen_addr: SocketAddr,

    /// Chain id reported by `Genesis` and `Status`.
    pub chain_id: String,

    /// Node moniker reported by `Status`.
    pub moniker: String,

    /// Tick interval of the block production driver.
    pub block_interval: Duration,

    /// Upper bound on how long `BroadcastTxCommit` waits for its transaction
    /// to land in a committed block.
    pub broadcast_tx_commit_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 26657)),
            chain_id: "mockbft-devnet".to_string(),
            moniker: "mockbft-node".to_string(),
            block_interval: Duration::from_secs(1),
            broadcast_tx_commit_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_standard_rpc_port() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 26657);
        assert_eq!(config.block_interval, Duration::from_secs(1));
    }

    #[test]
    fn round_trips_through_json() {
        let config = Config {
            block_interval: Duration::from_micros(500),
            ..Config::default()
        };
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: Config = serde_json::from_str(&encoded).unwrap();
        assert_eq!(config, decoded);
    }
}
