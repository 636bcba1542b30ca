use match_insights::keys;
use match_insights::{
    AppError, CacheOrchestrator, CacheStore, Config, MatchFetcher, MatchRecord, MemoryStore,
    ParticipantRecord, QueueFilter, SceneId, Season, StatsQuery, TypeFilter,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const PLAYER: &str = "puuid-me";

fn participant(player_id: &str, character: &str, kills: u32, deaths: u32, assists: u32, won: bool) -> ParticipantRecord {
    ParticipantRecord {
        player_id: player_id.to_string(),
        character_id: character.to_string(),
        team_id: 100,
        kills,
        deaths,
        assists,
        wards_placed: 8,
        wards_killed: 1,
        gold_earned: 10_000,
        minions_killed: 150,
        jungle_minions_killed: 10,
        damage_to_opponents: 18_000,
        vision_score: 20,
        won,
    }
}

fn record(id: &str, created: i64, duration: u64, me: ParticipantRecord) -> MatchRecord {
    MatchRecord {
        match_id: id.to_string(),
        game_creation: created,
        game_duration_seconds: duration,
        game_mode: "CLASSIC".to_string(),
        queue_id: 420,
        participants: vec![me, participant("someone-else", "Garen", 1, 1, 1, false)],
    }
}

/// m1 is the newest game.
fn three_matches() -> Vec<MatchRecord> {
    vec![
        record("NA1_1", 3_000, 1800, participant(PLAYER, "Ahri", 5, 2, 10, true)),
        record("NA1_2", 2_000, 1200, participant(PLAYER, "Ahri", 2, 0, 3, false)),
        record("NA1_3", 1_000, 2400, participant(PLAYER, "Zed", 8, 4, 1, true)),
    ]
}

#[derive(Default)]
struct FakeFetcher {
    ids: Mutex<Vec<String>>,
    matches: Mutex<HashMap<String, MatchRecord>>,
    unavailable: Mutex<HashSet<String>>,
    unknown_player: bool,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    details_in_flight: AtomicUsize,
    peak_details_in_flight: AtomicUsize,
    delay: Duration,
    /// The next id listing meets the test here twice: once on arrival, once to resume.
    list_gate: Mutex<Option<Arc<Barrier>>>,
}

impl FakeFetcher {
    fn with_matches(matches: Vec<MatchRecord>) -> Self {
        let fetcher = FakeFetcher::default();
        *fetcher.ids.lock() = matches.iter().map(|m| m.match_id.clone()).collect();
        *fetcher.matches.lock() = matches.into_iter().map(|m| (m.match_id.clone(), m)).collect();
        fetcher
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    fn peak_details_in_flight(&self) -> usize {
        self.peak_details_in_flight.load(Ordering::SeqCst)
    }

    fn push_newest(&self, m: MatchRecord) {
        self.ids.lock().insert(0, m.match_id.clone());
        self.matches.lock().insert(m.match_id.clone(), m);
    }
}

impl MatchFetcher for FakeFetcher {
    fn list_match_ids(
        &self,
        _player_id: &str,
        _region: &str,
        _queue: QueueFilter,
        _match_type: TypeFilter,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().take();
        if let Some(gate) = gate {
            gate.wait();
            gate.wait();
        }
        thread::sleep(self.delay);
        if self.unknown_player {
            return Err(AppError::NotFound("player".into()));
        }
        Ok(self.ids.lock().iter().skip(start).take(count).cloned().collect())
    }

    fn fetch_match_detail(&self, match_id: &str, _region: &str) -> Result<Option<MatchRecord>, AppError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.details_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_details_in_flight.fetch_max(now, Ordering::SeqCst);

        // Later matches finish first, so completion order differs from list order.
        let nth = self.ids.lock().iter().position(|id| id == match_id).unwrap_or(0);
        thread::sleep(self.delay + Duration::from_millis(10 * (5 - nth.min(5)) as u64));
        self.details_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unavailable.lock().contains(match_id) {
            return Err(AppError::UpstreamUnavailable("503".into()));
        }
        Ok(self.matches.lock().get(match_id).cloned())
    }
}

/// Store whose deletes fail for keys matching a prefix; reads can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    failing_delete_prefix: Option<&'static str>,
    down: bool,
}

impl CacheStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        if self.down {
            return Err(AppError::CacheBackendUnavailable("connection refused".into()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        if self.down {
            return Err(AppError::CacheBackendUnavailable("connection refused".into()));
        }
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        if self.failing_delete_prefix.is_some_and(|p| key.starts_with(p)) || self.down {
            return Err(AppError::CacheBackendUnavailable("delete refused".into()));
        }
        self.inner.delete(key)
    }
}

/// Store that reports the first summary write and then stalls it before it lands.
#[derive(Default)]
struct SlowSetStore {
    inner: MemoryStore,
    summary_write_started: Mutex<Option<Sender<()>>>,
}

impl CacheStore for SlowSetStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AppError> {
        if key.starts_with("summary:") {
            let started = self.summary_write_started.lock().take();
            if let Some(started) = started {
                let _ = started.send(());
                thread::sleep(Duration::from_millis(150));
            }
        }
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), AppError> {
        self.inner.delete(key)
    }
}

fn all_summary_key() -> String {
    keys::summary_key(PLAYER, "na1", QueueFilter::All, TypeFilter::All, Season::All)
}

fn config() -> Config {
    Config {
        fetch_concurrency: 3,
        seasons: vec![2025],
        ..Config::default()
    }
}

fn orchestrator(fetcher: FakeFetcher) -> CacheOrchestrator<MemoryStore, FakeFetcher> {
    CacheOrchestrator::new(MemoryStore::new(), fetcher, &config())
}

#[test]
fn computes_then_serves_from_cache() {
    let orch = orchestrator(FakeFetcher::with_matches(three_matches()));
    let query = StatsQuery::new(PLAYER, "na1");

    let first = orch.get_or_compute(&query).unwrap();
    assert_eq!(first.total_games, 3);
    assert_eq!(first.wins, 2);
    assert_eq!(first.losses, 1);
    assert_eq!(first.recent_form, vec![true, false, true]);
    assert_eq!(orch.fetcher().list_calls(), 1);
    assert_eq!(orch.fetcher().detail_calls(), 3);

    let second = orch.get_or_compute(&query).unwrap();
    assert_eq!(first, second);
    assert_eq!(orch.fetcher().list_calls(), 1);
    assert_eq!(orch.fetcher().detail_calls(), 3);
}

#[test]
fn restores_chronological_order_after_fetch() {
    let mut matches = three_matches();
    // Upstream hands the ids back oldest first; creation time wins.
    matches.reverse();
    let orch = orchestrator(FakeFetcher::with_matches(matches));

    let summary = orch.get_or_compute(&StatsQuery::new(PLAYER, "na1")).unwrap();
    assert_eq!(summary.recent_form, vec![true, false, true]);
    let expected_dpm = (18_000.0 / 30.0 + 18_000.0 / 20.0 + 18_000.0 / 40.0) / 3.0;
    assert!((summary.avg_damage_per_minute - expected_dpm).abs() < 1e-9);
}

#[test]
fn match_records_are_shared_across_dimension_tuples() {
    let orch = orchestrator(FakeFetcher::with_matches(three_matches()));

    orch.get_or_compute(&StatsQuery::new(PLAYER, "na1")).unwrap();
    orch.get_or_compute(&StatsQuery::new(PLAYER, "na1").queue(QueueFilter::Queue(420)))
        .unwrap();

    assert_eq!(orch.fetcher().list_calls(), 2);
    assert_eq!(orch.fetcher().detail_calls(), 3);
}

#[test]
fn duplicate_ids_are_fetched_once() {
    let fetcher = FakeFetcher::with_matches(three_matches());
    fetcher.ids.lock().push("NA1_1".to_string());
    let orch = orchestrator(fetcher);

    let summary = orch.get_or_compute(&StatsQuery::new(PLAYER, "na1")).unwrap();
    assert_eq!(summary.total_games, 3);
    assert_eq!(orch.fetcher().detail_calls(), 3);
}

#[test]
fn zero_matches_is_a_valid_cached_summary() {
    let orch = orchestrator(FakeFetcher::default());
    let query = StatsQuery::new(PLAYER, "na1");

    let summary = orch.get_or_compute(&query).unwrap();
    assert_eq!(summary.total_games, 0);
    assert_eq!(summary.win_rate, 0.0);
    assert!(summary.recent_form.is_empty());
    assert!(summary.character_stats.is_empty());

    orch.get_or_compute(&query).unwrap();
    assert_eq!(orch.fetcher().list_calls(), 1);
}

#[test]
fn season_filters_on_creation_time() {
    let start_2025 = 1_735_689_600_000; // 2025-01-01T00:00:00Z
    let matches = vec![
        record("NA1_1", start_2025 + 10, 1800, participant(PLAYER, "Ahri", 1, 1, 1, true)),
        record("NA1_2", start_2025 - 10, 1800, participant(PLAYER, "Zed", 1, 1, 1, false)),
    ];
    let orch = orchestrator(FakeFetcher::with_matches(matches));

    let season = orch
        .get_or_compute(&StatsQuery::new(PLAYER, "na1").season(Season::Year(2025)))
        .unwrap();
    assert_eq!(season.total_games, 1);
    assert_eq!(season.character_stats[0].character_id, "Ahri");

    let all = orch.get_or_compute(&StatsQuery::new(PLAYER, "na1")).unwrap();
    assert_eq!(all.total_games, 2);
}

#[test]
fn rejects_dimensions_outside_the_vocabulary() {
    let orch = orchestrator(FakeFetcher::with_matches(three_matches()));

    let bad_region = orch.get_or_compute(&StatsQuery::new(PLAYER, "moon1"));
    assert!(matches!(bad_region, Err(AppError::InvalidDimension(_))));

    let bad_season = orch.get_or_compute(&StatsQuery::new(PLAYER, "na1").season(Season::Year(1999)));
    assert!(matches!(bad_season, Err(AppError::InvalidDimension(_))));
    assert_eq!(orch.fetcher().list_calls(), 0);
}

#[test]
fn unknown_player_is_cached_as_negative_result() {
    let fetcher = FakeFetcher {
        unknown_player: true,
        ..FakeFetcher::default()
    };
    let orch = orchestrator(fetcher);
    let query = StatsQuery::new(PLAYER, "na1");

    assert!(matches!(orch.get_or_compute(&query), Err(AppError::NotFound(_))));
    assert!(matches!(orch.get_or_compute(&query), Err(AppError::NotFound(_))));
    assert_eq!(orch.fetcher().list_calls(), 1);
    assert!(orch.store().contains(&keys::not_found_key(PLAYER)));

    orch.invalidate_all(PLAYER);
    assert!(matches!(orch.get_or_compute(&query), Err(AppError::NotFound(_))));
    assert_eq!(orch.fetcher().list_calls(), 2);
}

#[test]
fn transient_failures_are_not_cached() {
    let fetcher = FakeFetcher::with_matches(three_matches());
    fetcher.unavailable.lock().insert("NA1_2".to_string());
    let orch = orchestrator(fetcher);
    let query = StatsQuery::new(PLAYER, "na1");

    let partial = orch.get_or_compute(&query).unwrap();
    assert_eq!(partial.total_games, 2);
    assert!(!orch.store().contains(&keys::summary_key(
        PLAYER,
        "na1",
        QueueFilter::All,
        TypeFilter::All,
        Season::All
    )));

    orch.fetcher().unavailable.lock().clear();
    let full = orch.get_or_compute(&query).unwrap();
    assert_eq!(full.total_games, 3);
}

#[test]
fn total_upstream_failure_is_an_error() {
    let fetcher = FakeFetcher::with_matches(three_matches());
    for id in ["NA1_1", "NA1_2", "NA1_3"] {
        fetcher.unavailable.lock().insert(id.to_string());
    }
    let orch = orchestrator(fetcher);

    let outcome = orch.get_or_compute(&StatsQuery::new(PLAYER, "na1"));
    assert!(matches!(outcome, Err(AppError::UpstreamUnavailable(_))));
}

#[test]
fn backend_outage_degrades_to_recomputation() {
    let store = FlakyStore {
        down: true,
        ..FlakyStore::default()
    };
    let orch = CacheOrchestrator::new(store, FakeFetcher::with_matches(three_matches()), &config());
    let query = StatsQuery::new(PLAYER, "na1");

    assert_eq!(orch.get_or_compute(&query).unwrap().total_games, 3);
    assert_eq!(orch.get_or_compute(&query).unwrap().total_games, 3);
    assert_eq!(orch.fetcher().list_calls(), 2);
}

#[test]
fn invalidation_covers_every_derived_key() {
    let orch = orchestrator(FakeFetcher::with_matches(three_matches()));

    // Populate every dimension tuple, season and scene for the player.
    let space = orch.key_space().clone();
    for tuple in space.dimension_tuples() {
        for season in &space.seasons {
            let query = StatsQuery::new(PLAYER, &tuple.region)
                .queue(tuple.queue)
                .match_type(tuple.match_type)
                .season(*season);
            orch.get_or_compute(&query).unwrap();
        }
    }
    for scene in SceneId::ALL {
        orch.get_or_compute_scene(PLAYER, "na1", scene).unwrap();
    }
    let lists_before = orch.fetcher().list_calls();
    assert_eq!(lists_before, space.dimension_tuples().count());

    let report = orch.invalidate_all(PLAYER);
    assert!(report.is_complete());
    assert_eq!(report.cleared_keys, space.player_keys(PLAYER));
    for key in &report.cleared_keys {
        assert!(!orch.store().contains(key), "{key} survived invalidation");
    }

    // Match records are immutable and stay cached.
    assert!(orch.store().contains(&keys::match_key("na1", "NA1_1")));

    // Every tuple misses again.
    for tuple in space.dimension_tuples() {
        let query = StatsQuery::new(PLAYER, &tuple.region)
            .queue(tuple.queue)
            .match_type(tuple.match_type);
        orch.get_or_compute(&query).unwrap();
    }
    assert_eq!(orch.fetcher().list_calls(), lists_before * 2);
}

#[test]
fn invalidation_of_unknown_player_is_harmless() {
    let orch = orchestrator(FakeFetcher::default());
    let report = orch.invalidate_all("never-seen");
    assert!(report.is_complete());
    assert_eq!(report.targeted(), orch.key_space().player_keys("never-seen").len());
}

#[test]
fn invalidation_reports_partial_failure_and_continues() {
    let store = FlakyStore {
        failing_delete_prefix: Some("scene:"),
        ..FlakyStore::default()
    };
    let orch = CacheOrchestrator::new(store, FakeFetcher::with_matches(three_matches()), &config());
    orch.get_or_compute(&StatsQuery::new(PLAYER, "na1")).unwrap();

    let report = orch.invalidate_all(PLAYER);
    assert_eq!(report.failed_keys.len(), SceneId::ALL.len());
    assert!(report.failed_keys.iter().all(|k| k.starts_with("scene:")));
    assert_eq!(report.targeted(), orch.key_space().player_keys(PLAYER).len());
    assert!(!orch.store().inner.contains(&keys::summary_key(
        PLAYER,
        "na1",
        QueueFilter::All,
        TypeFilter::All,
        Season::All
    )));
}

#[test]
fn scenes_are_cached_independently() {
    let orch = orchestrator(FakeFetcher::with_matches(three_matches()));

    let review = orch.get_or_compute_scene(PLAYER, "na1", SceneId::YearInReview).unwrap();
    assert_eq!(review.games, 3);
    assert!(orch.store().contains(&keys::scene_key(PLAYER, SceneId::YearInReview)));
    assert!(!orch.store().contains(&keys::scene_key(PLAYER, SceneId::Weaknesses)));

    let again = orch.get_or_compute_scene(PLAYER, "na1", SceneId::YearInReview).unwrap();
    assert_eq!(review, again);
    assert_eq!(orch.fetcher().list_calls(), 1);
}

#[test]
fn concurrent_identical_misses_coalesce() {
    let fetcher = FakeFetcher {
        delay: Duration::from_millis(50),
        ..FakeFetcher::with_matches(three_matches())
    };
    let orch = orchestrator(fetcher);
    let query = StatsQuery::new(PLAYER, "na1");
    let barrier = Barrier::new(6);

    let (orch_ref, query_ref, barrier_ref) = (&orch, &query, &barrier);
    let results: Vec<_> = thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..6 {
            handles.push(scope.spawn(move || {
                barrier_ref.wait();
                orch_ref.get_or_compute(query_ref)
            }));
        }
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = results[0].as_ref().unwrap();
    assert!(results.iter().all(|r| r.as_ref().unwrap() == first));
    assert_eq!(orch.fetcher().list_calls(), 1);
    assert_eq!(orch.fetcher().detail_calls(), 3);
}

#[test]
fn detail_fetches_stay_under_the_concurrency_cap() {
    let matches: Vec<MatchRecord> = (0..8)
        .map(|i| {
            record(
                &format!("NA1_{}", 100 + i),
                10_000 - i as i64,
                1800,
                participant(PLAYER, "Lux", 3, 3, 3, i % 2 == 0),
            )
        })
        .collect();
    let fetcher = FakeFetcher {
        delay: Duration::from_millis(20),
        ..FakeFetcher::with_matches(matches)
    };
    let orch = orchestrator(fetcher);

    let summary = orch.get_or_compute(&StatsQuery::new(PLAYER, "na1")).unwrap();
    assert_eq!(summary.total_games, 8);
    assert_eq!(orch.fetcher().detail_calls(), 8);

    let peak = orch.fetcher().peak_details_in_flight();
    assert!(peak <= config().fetch_concurrency, "peak of {peak} concurrent fetches");
    assert!(peak > 1, "fetches never overlapped");
}

#[test]
fn invalidation_mid_computation_discards_its_result() {
    let gate = Arc::new(Barrier::new(2));
    let fetcher = FakeFetcher::with_matches(three_matches());
    *fetcher.list_gate.lock() = Some(gate.clone());
    let orch = orchestrator(fetcher);
    let query = StatsQuery::new(PLAYER, "na1");

    let (orch_ref, query_ref) = (&orch, &query);
    let stale = thread::scope(|scope| {
        let computing = scope.spawn(move || orch_ref.get_or_compute(query_ref));
        gate.wait();
        assert!(orch.invalidate_all(PLAYER).is_complete());
        gate.wait();
        computing.join().unwrap()
    });

    // The caller still gets its answer, but nothing from the old epoch is cached.
    assert_eq!(stale.unwrap().total_games, 3);
    assert!(!orch.store().contains(&all_summary_key()));
    assert!(!orch
        .store()
        .contains(&keys::match_ids_key(PLAYER, "na1", QueueFilter::All, TypeFilter::All)));

    orch.get_or_compute(&query).unwrap();
    assert_eq!(orch.fetcher().list_calls(), 2);
    assert!(orch.store().contains(&all_summary_key()));
}

#[test]
fn invalidation_waits_for_a_write_already_in_progress() {
    let (started_tx, started_rx) = mpsc::channel();
    let store = SlowSetStore::default();
    *store.summary_write_started.lock() = Some(started_tx);
    let orch = CacheOrchestrator::new(store, FakeFetcher::with_matches(three_matches()), &config());
    let query = StatsQuery::new(PLAYER, "na1");

    let (orch_ref, query_ref) = (&orch, &query);
    thread::scope(|scope| {
        let computing = scope.spawn(move || orch_ref.get_or_compute(query_ref));
        started_rx.recv().unwrap();
        assert!(orch.invalidate_all(PLAYER).is_complete());
        assert!(
            !orch.store().inner.contains(&all_summary_key()),
            "summary written after invalidation completed"
        );
        assert_eq!(computing.join().unwrap().unwrap().total_games, 3);
    });

    assert!(!orch.store().inner.contains(&all_summary_key()));
    orch.get_or_compute(&query).unwrap();
    assert_eq!(orch.fetcher().list_calls(), 2);
}

#[test]
fn changed_match_set_drops_derived_entries() {
    let mut cfg = config();
    cfg.ttl.match_ids = Duration::ZERO;
    let orch = CacheOrchestrator::new(
        MemoryStore::new(),
        FakeFetcher::with_matches(three_matches()),
        &cfg,
    );
    let query = StatsQuery::new(PLAYER, "na1");
    let scene_key = keys::scene_key(PLAYER, SceneId::YearInReview);

    assert_eq!(orch.get_or_compute(&query).unwrap().total_games, 3);
    // An unchanged refetch leaves earlier entries alone.
    orch.get_or_compute_scene(PLAYER, "na1", SceneId::YearInReview).unwrap();
    assert!(orch.store().contains(&all_summary_key()));
    assert!(orch.store().contains(&scene_key));

    orch.fetcher().push_newest(record(
        "NA1_4",
        4_000,
        1500,
        participant(PLAYER, "Lux", 4, 1, 7, true),
    ));
    let other = orch
        .get_or_compute(&StatsQuery::new(PLAYER, "na1").season(Season::Year(2025)))
        .unwrap();
    assert_eq!(other.total_games, 0);
    assert!(!orch.store().contains(&all_summary_key()));
    assert!(!orch.store().contains(&scene_key));

    let scene = orch
        .get_or_compute_scene(PLAYER, "na1", SceneId::YearInReview)
        .unwrap();
    let summary = orch.get_or_compute(&query).unwrap();
    assert_eq!(scene.games, 4);
    assert_eq!(summary.total_games, 4);
}

#[test]
fn scene_for_another_region_is_recomputed() {
    let orch = orchestrator(FakeFetcher::with_matches(three_matches()));

    let na = orch.get_or_compute_scene(PLAYER, "na1", SceneId::Vision).unwrap();
    assert_eq!(na.region, "na1");

    let euw = orch.get_or_compute_scene(PLAYER, "euw1", SceneId::Vision).unwrap();
    assert_eq!(euw.region, "euw1");
    assert_eq!(orch.fetcher().list_calls(), 2);

    let again = orch.get_or_compute_scene(PLAYER, "euw1", SceneId::Vision).unwrap();
    assert_eq!(again, euw);
    assert_eq!(orch.fetcher().list_calls(), 2);
}
