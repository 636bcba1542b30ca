//! Cache-aside access to player summaries and scenes.
//!
//! Read path: summary/scene key -> match-id list key -> per-match keys ->
//! upstream. Identical concurrent misses coalesce at every level. Writes are
//! skipped when the player was invalidated while the computation ran, so a
//! derived entry never outlives the history it was computed from.
//!
//! Each player has an epoch behind a `RwLock`. Derived writes hold it shared
//! across the epoch check and the backend `set`; invalidation and purges hold
//! it exclusively across the bump and the deletes.

use crate::analysis::{aggregate, compute_scene, SceneReport};
use crate::coalesce::Coalescer;
use crate::config::{Config, TtlConfig};
use crate::error::AppError;
use crate::fetcher::MatchFetcher;
use crate::keys::{self, KeySpace, QueueFilter, SceneId, Season, TypeFilter};
use crate::model::{MatchRecord, PlayerStatsSummary};
use crate::store::CacheStore;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use chrono::Utc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub player_id: String,
    pub region: String,
    pub queue: QueueFilter,
    pub match_type: TypeFilter,
    pub season: Season,
}

impl StatsQuery {
    pub fn new(player_id: &str, region: &str) -> Self {
        StatsQuery {
            player_id: player_id.to_string(),
            region: region.to_string(),
            queue: QueueFilter::All,
            match_type: TypeFilter::All,
            season: Season::All,
        }
    }

    pub fn queue(mut self, queue: QueueFilter) -> Self {
        self.queue = queue;
        self
    }

    pub fn match_type(mut self, match_type: TypeFilter) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn season(mut self, season: Season) -> Self {
        self.season = season;
        self
    }

    fn key(&self) -> String {
        keys::summary_key(&self.player_id, &self.region, self.queue, self.match_type, self.season)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvalidationReport {
    pub cleared_keys: Vec<String>,
    pub failed_keys: Vec<String>,
}

impl InvalidationReport {
    pub fn is_complete(&self) -> bool {
        self.failed_keys.is_empty()
    }

    pub fn targeted(&self) -> usize {
        self.cleared_keys.len() + self.failed_keys.len()
    }
}

/// Cached match-id list. The entry outlives `fresh_until` so a refetch can
/// tell whether the match set changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdList {
    ids: Vec<String>,
    fresh_until: i64,
}

impl IdList {
    fn new(ids: Vec<String>, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        IdList {
            ids,
            fresh_until: Utc::now().timestamp_millis().saturating_add(ttl_ms),
        }
    }

    fn is_fresh(&self) -> bool {
        Utc::now().timestamp_millis() < self.fresh_until
    }
}

/// Records for one dimension tuple, most recent first.
struct History {
    records: Vec<MatchRecord>,
    /// False when some detail fetches failed transiently.
    complete: bool,
}

pub struct CacheOrchestrator<S, F> {
    store: S,
    fetcher: F,
    key_space: KeySpace,
    ttl: TtlConfig,
    match_count: usize,
    concurrency: usize,
    epochs: Mutex<HashMap<String, Arc<RwLock<u64>>>>,
    summaries: Coalescer<PlayerStatsSummary>,
    scenes: Coalescer<SceneReport>,
    match_ids: Coalescer<Vec<String>>,
    details: Coalescer<Option<MatchRecord>>,
}

impl<S: CacheStore, F: MatchFetcher> CacheOrchestrator<S, F> {
    pub fn new(store: S, fetcher: F, config: &Config) -> Self {
        CacheOrchestrator {
            store,
            fetcher,
            key_space: config.key_space(),
            ttl: config.ttl.clone(),
            match_count: config.match_count,
            concurrency: config.fetch_concurrency.max(1),
            epochs: Mutex::new(HashMap::new()),
            summaries: Coalescer::new(),
            scenes: Coalescer::new(),
            match_ids: Coalescer::new(),
            details: Coalescer::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn key_space(&self) -> &KeySpace {
        &self.key_space
    }

    pub fn get_or_compute(&self, query: &StatsQuery) -> Result<PlayerStatsSummary, AppError> {
        self.key_space
            .validate(&query.region, query.queue, query.match_type, query.season)?;

        let key = query.key();
        if let Some(summary) = self.read::<PlayerStatsSummary>(&key) {
            debug!(%key, "summary cache hit");
            return Ok(summary);
        }

        let epoch = self.epoch(&query.player_id);
        self.summaries.run(&flight_key(&key, epoch), || {
            // A previous leader may have filled the entry after our first read.
            if let Some(summary) = self.read::<PlayerStatsSummary>(&key) {
                return Ok(summary);
            }
            info!(%key, "computing summary");

            let history = self.load_history(
                &query.player_id,
                &query.region,
                query.queue,
                query.match_type,
                epoch,
            )?;
            let in_season = history
                .records
                .iter()
                .filter(|m| query.season.contains(m.game_creation));
            let summary = aggregate(&query.player_id, in_season);

            if history.complete {
                self.write_if_current(&query.player_id, epoch, &key, &summary, self.ttl.summary);
            } else {
                warn!(%key, "partial history, summary not cached");
            }
            Ok(summary)
        })
    }

    pub fn get_or_compute_scene(
        &self,
        player_id: &str,
        region: &str,
        scene: SceneId,
    ) -> Result<SceneReport, AppError> {
        self.key_space.validate_region(region)?;

        // The key carries no region; a report built for another region is a miss.
        let key = keys::scene_key(player_id, scene);
        let cached = || {
            self.read::<SceneReport>(&key)
                .filter(|report| report.region == region)
        };
        if let Some(report) = cached() {
            debug!(%key, "scene cache hit");
            return Ok(report);
        }

        let epoch = self.epoch(player_id);
        let flight = format!("{}@{}", key, region);
        self.scenes.run(&flight_key(&flight, epoch), || {
            if let Some(report) = cached() {
                return Ok(report);
            }
            info!(%key, region, "computing scene");

            let history =
                self.load_history(player_id, region, QueueFilter::All, TypeFilter::All, epoch)?;
            let report = compute_scene(scene, player_id, &history.records).in_region(region);

            if history.complete {
                self.write_if_current(player_id, epoch, &key, &report, self.ttl.scene);
            }
            Ok(report)
        })
    }

    /// Deletes every key derived from the player's match history. Keeps going
    /// past individual failures and reports them.
    pub fn invalidate_all(&self, player_id: &str) -> InvalidationReport {
        let report = self.purge(player_id, self.key_space.player_keys(player_id));

        info!(
            player_id,
            cleared = report.cleared_keys.len(),
            failed = report.failed_keys.len(),
            "invalidated player cache"
        );
        report
    }

    fn epoch_lock(&self, player_id: &str) -> Arc<RwLock<u64>> {
        self.epochs
            .lock()
            .entry(player_id.to_string())
            .or_default()
            .clone()
    }

    fn epoch(&self, player_id: &str) -> u64 {
        *self.epoch_lock(player_id).read()
    }

    /// Bumps the player's epoch and deletes `keys`. Holds the epoch exclusively
    /// so no derived write from an older epoch can land after the deletes.
    fn purge(&self, player_id: &str, keys: Vec<String>) -> InvalidationReport {
        let lock = self.epoch_lock(player_id);
        let mut epoch = lock.write();
        *epoch += 1;

        let mut report = InvalidationReport::default();
        for key in keys {
            match self.store.delete(&key) {
                Ok(()) => report.cleared_keys.push(key),
                Err(e) => {
                    warn!(%key, error = %e, "failed to delete cache entry");
                    report.failed_keys.push(key);
                }
            }
        }
        report
    }

    fn load_history(
        &self,
        player_id: &str,
        region: &str,
        queue: QueueFilter,
        match_type: TypeFilter,
        epoch: u64,
    ) -> Result<History, AppError> {
        let ids = self.load_match_ids(player_id, region, queue, match_type, epoch)?;
        if ids.is_empty() {
            return Ok(History {
                records: Vec::new(),
                complete: true,
            });
        }

        let mut records = Vec::with_capacity(ids.len());
        let mut first_failure = None;
        let mut failures = 0;

        for (id, outcome) in ids.iter().zip(self.fetch_details(&ids, region)) {
            match outcome {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!(match_id = %id, "match not found, skipping"),
                Err(e) if e.is_retryable() => {
                    warn!(match_id = %id, error = %e, "match detail fetch failed");
                    failures += 1;
                    first_failure.get_or_insert(e);
                }
                Err(e) => warn!(match_id = %id, error = %e, "unusable match detail, skipping"),
            }
        }

        if records.is_empty() {
            if let Some(e) = first_failure {
                return Err(e);
            }
        }

        // Completion order is arbitrary; restore newest-first. Stable, so the
        // upstream list order breaks ties.
        records.sort_by_key(|m| Reverse(m.game_creation));

        Ok(History {
            records,
            complete: failures == 0,
        })
    }

    fn load_match_ids(
        &self,
        player_id: &str,
        region: &str,
        queue: QueueFilter,
        match_type: TypeFilter,
        epoch: u64,
    ) -> Result<Vec<String>, AppError> {
        let missing_key = keys::not_found_key(player_id);
        if self.read::<bool>(&missing_key).is_some() {
            return Err(AppError::NotFound(format!("player {}", player_id)));
        }

        let key = keys::match_ids_key(player_id, region, queue, match_type);
        let previous = match self.read::<IdList>(&key) {
            Some(list) if list.is_fresh() => {
                debug!(%key, "match id cache hit");
                return Ok(list.ids);
            }
            stale => stale,
        };

        self.match_ids.run(&flight_key(&key, epoch), || {
            let fetched = self
                .fetcher
                .list_match_ids(player_id, region, queue, match_type, 0, self.match_count);

            match fetched {
                Ok(ids) => {
                    let mut seen = HashSet::new();
                    let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
                    let list = IdList::new(ids, self.ttl.match_ids);
                    self.write_if_current(player_id, epoch, &key, &list, self.id_list_retention());

                    if previous.is_some_and(|p| p.ids != list.ids) {
                        let report = self.purge(player_id, self.key_space.derived_keys(player_id));
                        info!(
                            %key,
                            cleared = report.cleared_keys.len(),
                            failed = report.failed_keys.len(),
                            "match history changed, dropped derived entries"
                        );
                    }
                    Ok(list.ids)
                }
                Err(AppError::NotFound(what)) => {
                    self.write_if_current(player_id, epoch, &missing_key, &true, self.ttl.not_found);
                    Err(AppError::NotFound(what))
                }
                Err(e) => Err(e),
            }
        })
    }

    /// An id list stays readable until every derived entry built from it has
    /// expired, so a later refetch can still compare against it.
    fn id_list_retention(&self) -> Duration {
        self.ttl.match_ids.saturating_add(self.ttl.summary.max(self.ttl.scene))
    }

    /// Bounded fan-out over the detail fetches. Results come back in `ids` order.
    fn fetch_details(
        &self,
        ids: &[String],
        region: &str,
    ) -> Vec<Result<Option<MatchRecord>, AppError>> {
        let workers = self.concurrency.min(ids.len()).max(1);
        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<Option<MatchRecord>, AppError>>> =
            (0..ids.len()).map(|_| None).collect();

        let next = &next;
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                handles.push(scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(id) = ids.get(i) else { break };
                        done.push((i, self.load_match(id, region)));
                    }
                    done
                }));
            }

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (i, outcome) in done {
                            slots[i] = Some(outcome);
                        }
                    }
                    Err(_) => warn!("match detail worker panicked"),
                }
            }
        });

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(AppError::UpstreamUnavailable("match detail fetch did not complete".to_string()))
                })
            })
            .collect()
    }

    fn load_match(&self, match_id: &str, region: &str) -> Result<Option<MatchRecord>, AppError> {
        let key = keys::match_key(region, match_id);
        if let Some(record) = self.read::<MatchRecord>(&key) {
            return Ok(Some(record));
        }

        self.details.run(&key, || {
            let record = self.fetcher.fetch_match_detail(match_id, region)?;
            if let Some(record) = &record {
                self.write(&key, record, self.ttl.match_record);
            }
            Ok(record)
        })
    }

    /// Backend failures and undecodable entries read as misses.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "undecodable cache entry, recomputing");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed, recomputing");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, raw, ttl) {
            warn!(key, error = %e, "cache write failed");
        }
    }

    fn write_if_current<T: Serialize>(&self, player_id: &str, epoch: u64, key: &str, value: &T, ttl: Duration) {
        let lock = self.epoch_lock(player_id);
        let current = lock.read();
        if *current != epoch {
            debug!(key, "player invalidated during computation, not caching");
            return;
        }
        self.write(key, value, ttl);
    }
}

fn flight_key(key: &str, epoch: u64) -> String {
    format!("{}@{}", key, epoch)
}
