use crate::errors::{FeedError, FeedResult};
use crate::source::{FeedItem, PollSource, PushSource};
use async_channel::{bounded, Receiver, Sender};
use echomint_types::Height;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use triggered::{Listener, Trigger};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Cadence at which poll sources are asked for the next expected height
    pub poll_interval: Duration,
    /// A source whose request stalls beyond this is treated as failed
    pub source_timeout: Duration,
    /// Consecutive failures before a source is marked unhealthy
    pub max_consecutive_failures: u32,
    /// Bound of the internal and output channels (backpressure)
    pub channel_capacity: usize,
    /// Bound of the out-of-order buffer awaiting gap closure
    pub reorder_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            source_timeout: Duration::from_secs(10),
            max_consecutive_failures: 3,
            channel_capacity: 16,
            reorder_capacity: 64,
        }
    }
}

/// Merges an arbitrary number of polling and push upstream sources into one
/// ordered, deduplicated, gap-free stream of finalized blocks.
///
/// Every source runs on its own task and publishes into a bounded internal
/// channel; a sequencer task enforces strict height order and exact-once
/// forwarding into the bounded output channel, so the feed never runs ahead
/// of its consumer. A source that errors or stalls repeatedly is excluded
/// (and retried with backoff); when no healthy source remains the output
/// channel is closed, which consumers must treat as fatal.
pub struct AggregateBlockFeed {
    poll_sources: Vec<Arc<dyn PollSource>>,
    push_sources: Vec<Arc<dyn PushSource>>,
    config: FeedConfig,
    synced: Arc<AtomicBool>,
    next_wanted: Arc<AtomicU64>,
    healthy_sources: Arc<AtomicUsize>,
    shutdown_trigger: Trigger,
    shutdown_listener: Listener,
    subscribed: Mutex<bool>,
}

impl AggregateBlockFeed {
    pub fn new(poll_sources: Vec<Arc<dyn PollSource>>, push_sources: Vec<Arc<dyn PushSource>>) -> Self {
        Self::with_config(poll_sources, push_sources, FeedConfig::default())
    }

    pub fn with_config(
        poll_sources: Vec<Arc<dyn PollSource>>,
        push_sources: Vec<Arc<dyn PushSource>>,
        config: FeedConfig,
    ) -> Self {
        let (shutdown_trigger, shutdown_listener) = triggered::trigger();
        Self {
            poll_sources,
            push_sources,
            config,
            synced: Arc::new(AtomicBool::new(false)),
            next_wanted: Arc::new(AtomicU64::new(0)),
            healthy_sources: Arc::new(AtomicUsize::new(0)),
            shutdown_trigger,
            shutdown_listener,
            subscribed: Mutex::new(false),
        }
    }

    /// Whether the feed believes it has caught up to the network tip. Cheap
    /// enough for request-path gating; the flag is sticky once set.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    pub fn source_count(&self) -> usize {
        self.poll_sources.len() + self.push_sources.len()
    }

    pub fn healthy_source_count(&self) -> usize {
        self.healthy_sources.load(Ordering::Acquire)
    }

    pub fn shutdown(&self) {
        self.shutdown_trigger.trigger();
    }

    /// Starts all source tasks and the sequencer, returning the ordered
    /// stream of blocks beginning exactly at `from_height`. Must be called
    /// from within a tokio runtime, and at most once per feed.
    pub fn subscribe(&self, from_height: Height) -> FeedResult<Receiver<FeedItem>> {
        if self.poll_sources.is_empty() && self.push_sources.is_empty() {
            return Err(FeedError::SubscriptionFailed("no block sources configured".into()));
        }
        {
            let mut subscribed = self.subscribed.lock();
            if *subscribed {
                return Err(FeedError::SubscriptionFailed("feed is already subscribed".into()));
            }
            *subscribed = true;
        }

        self.next_wanted.store(from_height, Ordering::Release);
        self.healthy_sources.store(self.source_count(), Ordering::Release);

        let (internal_tx, internal_rx) = bounded(self.config.channel_capacity);
        let (out_tx, out_rx) = bounded(self.config.channel_capacity);

        for source in &self.poll_sources {
            tokio::spawn(run_poll_source(
                source.clone(),
                internal_tx.clone(),
                self.next_wanted.clone(),
                self.synced.clone(),
                self.healthy_sources.clone(),
                self.config.clone(),
                self.shutdown_listener.clone(),
                self.shutdown_trigger.clone(),
            ));
        }
        for source in &self.push_sources {
            tokio::spawn(run_push_source(
                source.clone(),
                internal_tx.clone(),
                self.next_wanted.clone(),
                self.synced.clone(),
                self.healthy_sources.clone(),
                self.config.clone(),
                self.shutdown_listener.clone(),
                self.shutdown_trigger.clone(),
            ));
        }
        tokio::spawn(run_sequencer(
            internal_rx,
            out_tx,
            from_height,
            self.next_wanted.clone(),
            self.config.reorder_capacity,
            self.shutdown_listener.clone(),
        ));

        info!("block feed subscribed from height {} over {} source(s)", from_height, self.source_count());
        Ok(out_rx)
    }
}

/// Forwards blocks strictly in increasing height order, exactly once each.
/// Early blocks wait in a bounded reorder buffer until the gap below them
/// closes; anything below the next expected height is a duplicate and is
/// dropped.
async fn run_sequencer(
    internal_rx: Receiver<FeedItem>,
    out_tx: Sender<FeedItem>,
    from_height: Height,
    next_wanted: Arc<AtomicU64>,
    reorder_capacity: usize,
    shutdown: Listener,
) {
    let mut next = from_height;
    let mut pending: BTreeMap<Height, FeedItem> = BTreeMap::new();

    loop {
        let item = select! {
            _ = shutdown.clone() => break,
            item = internal_rx.recv() => match item {
                Ok(item) => item,
                Err(_) => break,
            },
        };
        let height = item.block.height();

        if height < next {
            debug!("dropping block {} from {}: below next expected {}", height, item.source, next);
            continue;
        }
        if height > next {
            if pending.len() >= reorder_capacity && !pending.contains_key(&height) {
                // keep the buffer closest to the gap; far-ahead blocks are
                // re-fetched by polling once the gap closes
                match pending.iter().next_back() {
                    Some((&farthest, _)) if farthest > height => {
                        pending.remove(&farthest);
                        pending.insert(height, item);
                    }
                    _ => warn!("reorder buffer full, discarding block {}", height),
                }
                continue;
            }
            // first accepted copy of a height wins
            pending.entry(height).or_insert(item);
            continue;
        }

        if out_tx.send(item).await.is_err() {
            break;
        }
        next += 1;
        while let Some(buffered) = pending.remove(&next) {
            if out_tx.send(buffered).await.is_err() {
                return;
            }
            next += 1;
        }
        next_wanted.store(next, Ordering::Release);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_poll_source(
    source: Arc<dyn PollSource>,
    internal_tx: Sender<FeedItem>,
    next_wanted: Arc<AtomicU64>,
    synced: Arc<AtomicBool>,
    healthy_sources: Arc<AtomicUsize>,
    config: FeedConfig,
    shutdown: Listener,
    shutdown_trigger: Trigger,
) {
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;
    let mut healthy = true;

    loop {
        select! {
            _ = shutdown.clone() => break,
            _ = ticker.tick() => {}
        }
        let wanted = next_wanted.load(Ordering::Acquire);
        let outcome = match timeout(config.source_timeout, source.fetch_block_at(wanted)).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::source(source.ident(), "request timed out")),
        };
        match outcome {
            Ok(Some(block)) => {
                recover(&mut healthy, &mut failures, source.ident(), &healthy_sources);
                if internal_tx.send(FeedItem { block, source: source.ident().to_string() }).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                // nothing beyond the next expected height: caught up
                recover(&mut healthy, &mut failures, source.ident(), &healthy_sources);
                synced.store(true, Ordering::Release);
            }
            Err(err) => {
                failures += 1;
                warn!(
                    "poll source {} failed ({}/{}): {}",
                    source.ident(),
                    failures,
                    config.max_consecutive_failures,
                    err
                );
                if healthy && failures >= config.max_consecutive_failures {
                    healthy = false;
                    mark_unhealthy(source.ident(), &healthy_sources, &shutdown_trigger, &next_wanted);
                }
                backoff(&config, failures).await;
            }
        }
    }
    debug!("poll source {} task exiting", source.ident());
}

#[allow(clippy::too_many_arguments)]
async fn run_push_source(
    source: Arc<dyn PushSource>,
    internal_tx: Sender<FeedItem>,
    next_wanted: Arc<AtomicU64>,
    synced: Arc<AtomicBool>,
    healthy_sources: Arc<AtomicUsize>,
    config: FeedConfig,
    shutdown: Listener,
    shutdown_trigger: Trigger,
) {
    let mut failures = 0u32;
    let mut healthy = true;

    'outer: loop {
        let stream = select! {
            _ = shutdown.clone() => break,
            result = source.subscribe() => result,
        };
        match stream {
            Ok(blocks) => {
                recover(&mut healthy, &mut failures, source.ident(), &healthy_sources);
                loop {
                    let block = select! {
                        _ = shutdown.clone() => break 'outer,
                        block = blocks.recv() => match block {
                            Ok(block) => block,
                            Err(_) => {
                                warn!("push source {} stream ended", source.ident());
                                break;
                            }
                        },
                    };
                    // delivering exactly the next expected block means we
                    // are consuming at the live edge
                    if block.height() == next_wanted.load(Ordering::Acquire) {
                        synced.store(true, Ordering::Release);
                    }
                    if internal_tx.send(FeedItem { block, source: source.ident().to_string() }).await.is_err() {
                        break 'outer;
                    }
                }
                failures += 1;
            }
            Err(err) => {
                failures += 1;
                warn!(
                    "push source {} subscription failed ({}/{}): {}",
                    source.ident(),
                    failures,
                    config.max_consecutive_failures,
                    err
                );
            }
        }
        if healthy && failures >= config.max_consecutive_failures {
            healthy = false;
            mark_unhealthy(source.ident(), &healthy_sources, &shutdown_trigger, &next_wanted);
        }
        backoff(&config, failures).await;
    }
    debug!("push source {} task exiting", source.ident());
}

fn recover(healthy: &mut bool, failures: &mut u32, ident: &str, healthy_sources: &AtomicUsize) {
    *failures = 0;
    if !*healthy {
        *healthy = true;
        healthy_sources.fetch_add(1, Ordering::AcqRel);
        info!("block source {} recovered", ident);
    }
}

fn mark_unhealthy(ident: &str, healthy_sources: &AtomicUsize, shutdown_trigger: &Trigger, next_wanted: &AtomicU64) {
    warn!("block source {} marked unhealthy", ident);
    if healthy_sources.fetch_sub(1, Ordering::AcqRel) == 1 {
        error!("{}", FeedError::AllSourcesExhausted(next_wanted.load(Ordering::Acquire)));
        shutdown_trigger.trigger();
    }
}

async fn backoff(config: &FeedConfig, failures: u32) {
    let base = config.poll_interval * 2u32.pow(failures.min(5));
    let jitter = rand::thread_rng().gen_range(0..=(base.as_millis() as u64 / 4).max(1));
    sleep(base + Duration::from_millis(jitter)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_requires_sources() {
        let feed = AggregateBlockFeed::new(vec![], vec![]);
        assert!(matches!(feed.subscribe(1), Err(FeedError::SubscriptionFailed(_))));
    }
}
