use crate::core::feed::{FeedView, MarketData};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically reloads the market view. The first load happens
/// immediately, then once per `every`.
pub struct RefreshScheduler;

impl RefreshScheduler {
    pub fn spawn<F>(market: Arc<MarketData>, every: Duration, on_update: F) -> RefreshHandle
    where
        F: Fn(FeedView) + Send + Sync + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Refresh tick");
                        let view = market.load().await;
                        on_update(view);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Refresh scheduler stopped");
                            break;
                        }
                    }
                }
            }
        });

        RefreshHandle { shutdown, task }
    }
}

pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stops the loop and waits for an in-flight load to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
