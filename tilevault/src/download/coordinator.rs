//! Bounded-concurrency batch download of one map.
//!
//! The coordinator writes the map manifest first, then runs a worker pool
//! over the tile queue. Tasks are spawned only while the pool has a free
//! slot, so a batch of thousands of tiles never has more than
//! `concurrency` requests in flight.
//!
//! All results flow back through a single `join_next` loop, which is the
//! only place progress is emitted and the report is updated.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{DownloadProgress, TilePhase};
use super::report::{DownloadReport, FailedTile};
use super::DownloadError;
use crate::catalog::{MapCatalog, MapManifest};
use crate::config::DownloadConfig;
use crate::coord::{TileCoord, TileKey};
use crate::fetch::TileFetcher;
use crate::provider::{AsyncHttpClient, TileProvider};
use crate::store::TileStore;

/// Result of one tile task.
struct TileOutcome {
    key: TileKey,
    attempts: u32,
    result: Result<(), String>,
}

/// Downloads batches of tiles into the tile store and records them as maps.
pub struct DownloadCoordinator<C> {
    fetcher: Arc<TileFetcher<C>>,
    catalog: Arc<MapCatalog>,
    config: DownloadConfig,
}

impl<C: AsyncHttpClient + 'static> DownloadCoordinator<C> {
    pub fn new(fetcher: Arc<TileFetcher<C>>, catalog: Arc<MapCatalog>, config: DownloadConfig) -> Self {
        Self {
            fetcher,
            catalog,
            config,
        }
    }

    /// Downloads `coords` from `provider_id` and records them as `map_name`.
    ///
    /// The manifest listing every requested key (in input order) is
    /// written before any tile is fetched. Each distinct tile is then
    /// fetched and stored once. Individual tile failures never fail the
    /// batch; they are listed in the returned report.
    ///
    /// If `progress` is given, one [`DownloadProgress`] is sent per finished
    /// tile. Cancelling `cancel` aborts in-flight fetches, skips queued
    /// tiles and returns a report with outcome `Cancelled`; the manifest
    /// is kept.
    ///
    /// # Errors
    ///
    /// Fails only if the provider is unknown or the manifest cannot be
    /// written. No tile is fetched in either case.
    pub async fn download_map(
        &self,
        map_name: &str,
        provider_id: &str,
        coords: &[TileCoord],
        progress: Option<mpsc::Sender<DownloadProgress>>,
        cancel: CancellationToken,
    ) -> Result<DownloadReport, DownloadError> {
        let provider = Arc::new(self.fetcher.registry().resolve(provider_id)?.clone());

        let manifest = MapManifest::for_coords(map_name, provider_id, coords)?;
        self.catalog.write_manifest(&manifest).await?;

        let mut seen = HashSet::with_capacity(manifest.len());
        let mut queue: VecDeque<TileKey> = manifest
            .tile_keys
            .iter()
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect();

        let total = queue.len();
        let limit = self.config.effective_concurrency(total);
        let mut report = DownloadReport::new(map_name, total);

        info!(
            map = %map_name,
            provider = %provider_id,
            tiles = total,
            concurrency = limit,
            timeout_secs = self.fetcher.timeout().as_secs(),
            "Starting map download"
        );

        let mut tasks: JoinSet<TileOutcome> = JoinSet::new();
        let mut in_flight: HashMap<Id, TileKey> = HashMap::new();

        while !queue.is_empty() || !tasks.is_empty() {
            if cancel.is_cancelled() {
                break;
            }

            // Fill free worker slots from the queue
            while tasks.len() < limit {
                let Some(key) = queue.pop_front() else {
                    break;
                };
                let handle = tasks.spawn(fetch_and_store(
                    Arc::clone(&self.fetcher),
                    Arc::clone(self.catalog.tiles()),
                    Arc::clone(&provider),
                    key.clone(),
                    self.config.clone(),
                ));
                in_flight.insert(handle.id(), key);
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                joined = tasks.join_next_with_id() => joined,
            };

            if let Some(outcome) = joined.and_then(|j| take_outcome(j, &mut in_flight, map_name)) {
                record(&mut report, outcome, progress.as_ref(), map_name).await;
            }
        }

        // Tiles stored before the cancel was seen still count
        while let Some(joined) = tasks.try_join_next_with_id() {
            if let Some(outcome) = take_outcome(joined, &mut in_flight, map_name) {
                record(&mut report, outcome, progress.as_ref(), map_name).await;
            }
        }

        if !queue.is_empty() || !in_flight.is_empty() {
            tasks.shutdown().await;
            report.cancelled = true;
            report.unfinished = in_flight.into_values().chain(queue).collect();
            report.unfinished.sort();
        }

        info!(
            map = %map_name,
            stored = report.stored,
            failed = report.failed.len(),
            unfinished = report.unfinished.len(),
            outcome = %report.outcome(),
            "Map download finished"
        );

        Ok(report)
    }
}

/// Match a joined task back to its tile. Panicked tasks become failures.
fn take_outcome(
    joined: Result<(Id, TileOutcome), JoinError>,
    in_flight: &mut HashMap<Id, TileKey>,
    map_name: &str,
) -> Option<TileOutcome> {
    match joined {
        Ok((id, outcome)) => {
            in_flight.remove(&id);
            Some(outcome)
        }
        Err(join_err) => {
            let key = in_flight.remove(&join_err.id())?;
            warn!(map = %map_name, key = %key, error = %join_err, "Tile task panicked");
            Some(TileOutcome {
                key,
                attempts: 0,
                result: Err(format!("task failed: {}", join_err)),
            })
        }
    }
}

/// Add one finished tile to the report and emit its progress event.
async fn record(
    report: &mut DownloadReport,
    outcome: TileOutcome,
    progress: Option<&mpsc::Sender<DownloadProgress>>,
    map_name: &str,
) {
    let phase = match outcome.result {
        Ok(()) => {
            report.stored += 1;
            TilePhase::Stored
        }
        Err(reason) => {
            warn!(
                map = %map_name,
                key = %outcome.key,
                attempts = outcome.attempts,
                error = %reason,
                "Tile download failed"
            );
            report.failed.push(FailedTile {
                key: outcome.key.clone(),
                reason,
                attempts: outcome.attempts,
            });
            TilePhase::Failed
        }
    };

    if let Some(tx) = progress {
        let event = DownloadProgress {
            completed: report.attempted(),
            total: report.total,
            key: outcome.key,
            phase,
        };
        // A dropped receiver only stops progress reporting
        let _ = tx.send(event).await;
    }
}

/// Fetches one tile, retrying transient failures, and stores it.
async fn fetch_and_store<C: AsyncHttpClient>(
    fetcher: Arc<TileFetcher<C>>,
    tiles: Arc<dyn TileStore>,
    provider: Arc<TileProvider>,
    key: TileKey,
    config: DownloadConfig,
) -> TileOutcome {
    let mut attempts = 0;

    let blob = loop {
        attempts += 1;
        match fetcher.fetch(&provider, key.coord()).await {
            Ok(blob) => break blob,
            Err(e) if e.is_retryable() && attempts <= config.max_retries => {
                let delay = config.retry_delay_for(attempts);
                debug!(key = %key, attempt = attempts, error = %e, delay_ms = delay.as_millis() as u64, "Retrying tile fetch");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return TileOutcome {
                    key,
                    attempts,
                    result: Err(e.to_string()),
                }
            }
        }
    };

    let bytes = blob.len();
    let result = tiles
        .set(&key.to_string(), blob.data)
        .await
        .map_err(|e| format!("store failed: {}", e));

    if result.is_ok() {
        debug!(key = %key, bytes = bytes, attempts = attempts, "Tile stored");
    }

    TileOutcome {
        key,
        attempts,
        result,
    }
}
