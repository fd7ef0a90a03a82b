mod args;
mod genesis;
mod kvapp;
mod logger;
mod sources;

use args::{Args, Settings};
use clap::Parser;
use echomint_database::prelude::{ConnBuilder, KvEngine, MemEngine, StagedDb};
use echomint_engine::{EngineError, Executor};
use echomint_feed::{AggregateBlockFeed, FeedConfig, FeedError, PollSource};
use echomint_store::{CommitmentMode, MultiStore};
use kvapp::KvApp;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
enum DaemonError {
    #[error(transparent)]
    Store(#[from] echomint_database::StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Genesis(#[from] genesis::GenesisError),

    #[error("{0}")]
    Config(String),

    #[error("block feed terminated; restart to resume from the last committed height")]
    FeedClosed,
}

fn main() {
    let args = Args::parse();
    let settings = match Settings::resolve(args) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("echomintd: {err}");
            std::process::exit(2);
        }
    };
    logger::init_logger(&settings.log_level);
    info!("echomintd {} starting", env!("CARGO_PKG_VERSION"));
    settings.print();

    // fatal conditions abort the whole process with a diagnostic; recovery
    // is restart-and-replay from the last durable committed height
    if let Err(err) = run(settings) {
        error!("fatal: {err}");
        std::process::exit(1);
    }
    info!("echomintd exited cleanly");
}

fn run(settings: Settings) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| DaemonError::Config(format!("cannot build runtime: {err}")))?;
    runtime.block_on(run_replica(settings))
}

async fn run_replica(settings: Settings) -> Result<(), DaemonError> {
    let engine: Arc<dyn KvEngine> = if settings.mem_db {
        Arc::new(MemEngine::new())
    } else {
        ConnBuilder::new(settings.db_dir()).build()?
    };
    let mut db = StagedDb::new(engine);
    if settings.debug_store_reads {
        db = db.with_read_audit();
    }
    let db = Arc::new(db);

    let mode = if settings.passthrough_commitment { CommitmentMode::Passthrough } else { CommitmentMode::Merkleized };
    let store = Arc::new(MultiStore::new(db.clone(), settings.chain_id.clone(), KvApp::store_names(), mode)?);
    let app = Arc::new(KvApp::new(store.clone()));
    let executor = Arc::new(Executor::new(app, db.clone(), store.clone()));

    match store.load()? {
        Some(state) => info!("resuming chain {} at committed height {}", state.chain_id, state.height),
        None => {
            let doc = genesis::load_genesis(&settings.genesis)?;
            executor.init(&doc)?;
            db.flush()?;
            info!("genesis applied at height {}", doc.initial_height);
        }
    }
    let chain = executor.load_initial_state()?;

    let (shutdown_trigger, shutdown) = triggered::trigger();
    ctrlc::set_handler({
        let trigger = shutdown_trigger.clone();
        move || trigger.trigger()
    })
    .map_err(|err| DaemonError::Config(format!("cannot install signal handler: {err}")))?;

    // cache-invalidation hook; external consumers subscribe the same way
    let commits = executor.subscribe_commits(64);
    tokio::spawn(async move {
        while let Ok(height) = commits.recv().await {
            debug!("cache invalidated at height {height}");
        }
    });

    if settings.disable_sync {
        // an explicit, separately observable mode, not a stalled feed
        info!("sync disabled; serving chain {} fixed at height {}", chain.chain_id, chain.height);
        shutdown.await;
        return Ok(());
    }

    if settings.block_dirs.is_empty() {
        return Err(DaemonError::Config("no block sources configured; pass --block-dir or use --disable-sync".into()));
    }
    let poll_sources: Vec<Arc<dyn PollSource>> = settings
        .block_dirs
        .iter()
        .map(|dir| Arc::new(sources::JsonDirSource::new(dir.clone())) as Arc<dyn PollSource>)
        .collect();
    let feed = AggregateBlockFeed::with_config(
        poll_sources,
        Vec::new(),
        FeedConfig {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            source_timeout: Duration::from_millis(settings.source_timeout_ms),
            ..FeedConfig::default()
        },
    );
    let blocks = feed.subscribe(chain.height + 1)?;
    info!("following chain {} from height {}", chain.chain_id, chain.height + 1);

    let mut was_synced = false;
    loop {
        let item = tokio::select! {
            _ = shutdown.clone() => break,
            item = blocks.recv() => match item {
                Ok(item) => item,
                Err(_) => {
                    feed.shutdown();
                    return Err(DaemonError::FeedClosed);
                }
            },
        };

        let chain = executor.inject(&item.block)?;

        // hand the block's event collector to the indexing hook
        let collector = executor.event_collector();
        debug!(
            "indexed block {} at height {} from {} ({} txs, {} failed)",
            item.block.id,
            chain.height,
            item.source,
            collector.tx_count(),
            collector.failed_tx_count()
        );

        if !was_synced && feed.is_synced() {
            was_synced = true;
            info!("caught up to the network tip at height {}", chain.height);
        }
    }

    feed.shutdown();
    info!("shutdown signal received; last committed height {}", executor.current_height().unwrap_or_default());
    Ok(())
}
