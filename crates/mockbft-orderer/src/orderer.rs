use std::{
    net::SocketAddr,
    sync::Arc,
};

use eyre::WrapErr as _;
use mockbft_core::ValidatorSet;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{
    error,
    info,
};

use crate::{
    app::Application,
    config::Config,
    consensus::ProposerSelector,
    driver::Driver,
    engine::Engine,
    rpc,
};

/// Assembles an [`Orderer`] from its parts.
///
/// The application, validator set, and proposer strategy are host-provided;
/// everything else comes from [`Config`].
pub struct Builder {
    pub config: Config,
    pub application: Arc<dyn Application>,
    pub validators: ValidatorSet,
    pub selector: Box<dyn ProposerSelector>,
    pub shutdown_token: CancellationToken,
}

impl Builder {
    /// Constructs the engine and binds the RPC listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC listener cannot be bound (e.g. the port is
    /// in use). This is the only fatal error in the kernel; nothing starts
    /// ticking when it fails.
    pub async fn build(self) -> eyre::Result<Orderer> {
        let Self {
            config,
            application,
            validators,
            selector,
            shutdown_token,
        } = self;

        let engine = Arc::new(Engine::new(
            application,
            validators,
            selector,
            config.chain_id.clone(),
        ));

        let rpc_server = rpc::Builder {
            listen_addr: config.listen_addr,
            engine: engine.clone(),
            moniker: config.moniker.clone(),
            broadcast_tx_commit_timeout: config.broadcast_tx_commit_timeout,
            shutdown_token: shutdown_token.child_token(),
        }
        .bind()
        .await
        .wrap_err("failed to start RPC server")?;
        info!(listen_addr = %rpc_server.local_addr(), "RPC server listening");

        let driver = Driver {
            engine: engine.clone(),
            block_interval: config.block_interval,
            shutdown_token: shutdown_token.child_token(),
        };

        Ok(Orderer {
            engine,
            rpc_server,
            driver,
            shutdown_token,
        })
    }
}

/// A fully assembled mock orderer: engine, block production driver, and the
/// JSON-RPC server. Hosts may run several in one process; there is no global
/// state.
pub struct Orderer {
    engine: Arc<Engine>,
    rpc_server: rpc::RpcServer,
    driver: Driver,
    shutdown_token: CancellationToken,
}

impl Orderer {
    /// The address the RPC server is actually bound to (relevant when the
    /// configured port was 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.rpc_server.local_addr()
    }

    /// The assembled engine, for hosts that drive block production by hand
    /// or inspect chain state directly.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Runs the driver and the RPC server until one of them exits or the
    /// shutdown token fires. The first exit cancels the other task and waits
    /// for it to drain.
    pub async fn run_until_stopped(self) {
        let Self {
            engine: _engine,
            rpc_server,
            driver,
            shutdown_token,
        } = self;

        let mut rpc_task = tokio::spawn(rpc_server.run_until_stopped());
        let mut driver_task = tokio::spawn(driver.run_until_stopped());

        tokio::select! {
            o = &mut rpc_task => {
                report_exit("rpc server", o);
                shutdown_token.cancel();
                report_exit("driver", driver_task.await);
            }
            o = &mut driver_task => {
                report_exit("driver", o);
                shutdown_token.cancel();
                report_exit("rpc server", rpc_task.await);
            }
        }
    }
}

fn report_exit(task_name: &str, outcome: Result<eyre::Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => info!(task = task_name, "task exited successfully"),
        Ok(Err(error)) => {
            error!(%error, task = task_name, "task returned with error");
        }
        Err(error) => {
            error!(%error, task = task_name, "task failed to complete");
        }
    }
}
