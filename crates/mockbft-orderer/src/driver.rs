use std::{
    sync::Arc,
    time::Duration,
};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    info,
    warn,
};

use crate::engine::Engine;

/// Background block production: one engine round per tick.
///
/// On shutdown the driver finishes the tick in flight and exits; it never
/// interrupts a round halfway.
pub(crate) struct Driver {
    pub(crate) engine: Arc<Engine>,
    pub(crate) block_interval: Duration,
    pub(crate) shutdown_token: CancellationToken,
}

impl Driver {
    pub(crate) async fn run_until_stopped(self) -> eyre::Result<()> {
        let Self {
            engine,
            block_interval,
            shutdown_token,
        } = self;

        let mut interval = tokio::time::interval(block_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?block_interval, "starting block production");

        loop {
            tokio::select! {
                biased;

                () = shutdown_token.cancelled() => {
                    info!("received shutdown signal; stopping block production");
                    break;
                }

                _ = interval.tick() => match engine.produce_block() {
                    Ok(Some(block)) => debug!(
                        height = block.height(),
                        hash = %block.hash(),
                        txs = block.txs().len(),
                        "produced block",
                    ),
                    Ok(None) => debug!("mempool empty; skipping round"),
                    Err(error) => warn!(%error, "round abandoned; transactions stay pending"),
                },
            }
        }
        Ok(())
    }
}
