use std::{
    net::SocketAddr,
    sync::{
        Arc,
        LazyLock,
    },
    time::Duration,
};

use mockbft_core::{
    Validator,
    ValidatorSet,
};
use mockbft_orderer::{
    Builder,
    Config,
    KvApplication,
    RoundRobin,
};
use serde_json::{
    json,
    Value,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

static TELEMETRY: LazyLock<()> = LazyLock::new(|| {
    if std::env::var_os("TEST_LOG").is_some() {
        let filter_directives = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        tracing_subscriber::fmt()
            .with_env_filter(filter_directives)
            .init();
    }
});

/// An orderer running on an ephemeral port, driven over real HTTP.
pub(crate) struct TestOrderer {
    pub(crate) addr: SocketAddr,
    pub(crate) client: reqwest::Client,
    shutdown_token: CancellationToken,
    task: JoinHandle<()>,
}

impl TestOrderer {
    pub(crate) async fn spawn() -> Self {
        Self::spawn_with_interval(Duration::from_millis(20)).await
    }

    pub(crate) async fn spawn_with_interval(block_interval: Duration) -> Self {
        LazyLock::force(&TELEMETRY);

        let config = Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            chain_id: "blackbox-chain".to_string(),
            moniker: "blackbox-node".to_string(),
            block_interval,
            broadcast_tx_commit_timeout: Duration::from_secs(5),
        };
        let validators = ValidatorSet::new(
            (0..4)
                .map(|i| Validator::new(format!("val-{i}"), format!("ADDR{i}"), 1))
                .collect(),
        )
        .unwrap();

        let shutdown_token = CancellationToken::new();
        let orderer = Builder {
            config,
            application: Arc::new(KvApplication::new()),
            validators,
            selector: Box::new(RoundRobin),
            shutdown_token: shutdown_token.clone(),
        }
        .build()
        .await
        .expect("failed to build orderer");
        let addr = orderer.local_addr();
        let task = tokio::spawn(orderer.run_until_stopped());

        Self {
            addr,
            client: reqwest::Client::new(),
            shutdown_token,
            task,
        }
    }

    /// Sends a JSON-RPC POST request and returns the full envelope.
    pub(crate) async fn call(&self, method: &str, params: Value) -> Value {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        self.client
            .post(format!("http://{}/", self.addr))
            .json(&body)
            .send()
            .await
            .expect("request failed")
            .json()
            .await
            .expect("response is not JSON")
    }

    /// Like [`Self::call`], but asserts success and unwraps the result.
    pub(crate) async fn result(&self, method: &str, params: Value) -> Value {
        let envelope = self.call(method, params).await;
        assert!(
            envelope.get("error").is_none(),
            "`{method}` returned an error: {envelope}"
        );
        envelope["result"].clone()
    }

    /// Sends a GET request with query parameters and unwraps the result.
    pub(crate) async fn get(&self, method: &str, query: &[(&str, &str)]) -> Value {
        let envelope: Value = self
            .client
            .get(format!("http://{}/{method}", self.addr))
            .query(query)
            .send()
            .await
            .expect("request failed")
            .json()
            .await
            .expect("response is not JSON");
        assert!(
            envelope.get("error").is_none(),
            "GET `{method}` returned an error: {envelope}"
        );
        envelope["result"].clone()
    }

    pub(crate) async fn latest_height(&self) -> i64 {
        self.result("Status", Value::Null).await["sync_info"]["latest_block_height"]
            .as_i64()
            .expect("latest_block_height is a number")
    }

    /// Polls `Status` until the chain reaches `height`.
    pub(crate) async fn wait_for_height(&self, height: i64) {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if self.latest_height().await >= height {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "chain never reached height {height}"
            );
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub(crate) async fn stop(self) {
        self.shutdown_token.cancel();
        self.task.await.expect("orderer task panicked");
    }
}
