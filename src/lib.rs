pub mod cli;
pub mod core;
pub mod providers;
pub mod store;
pub mod widget;

use crate::cli::{prices, ui};
use crate::core::asset::AssetCategory;
use crate::core::cache::SnapshotStore;
use crate::core::config::AppConfig;
use crate::core::feed::{FeedService, MarketData};
use crate::core::feed_cache::FeedCache;
use crate::core::scheduler::RefreshScheduler;
use crate::core::source::PriceSource;
use crate::providers::brsapi::BrsApiProvider;
use crate::providers::nobitex::NobitexProvider;
use crate::providers::util::build_client;
use crate::store::memory::MemoryStore;
use crate::widget::WidgetConfig;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub enum AppCommand {
    Prices {
        force: bool,
        category: Option<AssetCategory>,
        no_cache: bool,
    },
    Widget {
        config: WidgetConfig,
        origin: String,
    },
    Watch {
        /// Stop after this many refreshes; run until interrupted when `None`.
        ticks: Option<usize>,
    },
}

/// Wires the sources in priority order (crypto first, then the aggregator)
/// over one shared HTTP client.
pub fn build_feed_service(
    config: &AppConfig,
    store: Arc<dyn SnapshotStore>,
) -> Result<FeedService> {
    let client = build_client(config.refresh.request_timeout())?;
    let retries = config.refresh.retries;

    let nobitex = NobitexProvider::new(config.nobitex_url(), client.clone()).with_retries(retries);
    let brsapi = BrsApiProvider::new(config.brsapi_url(), config.brsapi_key(), client)
        .with_normalizer(Arc::new(config.normalizer))
        .with_retries(retries);
    let sources: Vec<Arc<dyn PriceSource>> = vec![Arc::new(nobitex), Arc::new(brsapi)];

    let cache = FeedCache::new(store).with_refresh_interval(config.refresh.cache_ttl());
    Ok(FeedService::new(sources, cache))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Nerkh starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store: Arc<dyn SnapshotStore> = match &command {
        AppCommand::Prices { no_cache: true, .. } => Arc::new(MemoryStore::new()),
        _ => store::open_default(&config),
    };
    let market = Arc::new(MarketData::new(Arc::new(build_feed_service(&config, store)?)));

    match command {
        AppCommand::Prices {
            force,
            category,
            no_cache: _,
        } => prices::run(&market, force, category).await,
        AppCommand::Widget { config, origin } => cli::widget::run(&market, &config, &origin).await,
        AppCommand::Watch { ticks } => watch(market, config.refresh.poll_interval(), ticks).await,
    }
}

async fn watch(market: Arc<MarketData>, every: std::time::Duration, ticks: Option<usize>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = RefreshScheduler::spawn(market, every, move |view| {
        let _ = tx.send(view);
    });

    let mut seen = 0;
    loop {
        tokio::select! {
            view = rx.recv() => {
                let Some(view) = view else { break };
                ui::print_separator();
                println!("{}", prices::render(&view, None));
                seen += 1;
                if ticks.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
