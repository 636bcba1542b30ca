//! Cache key derivation and the enumerable dimension vocabulary.
//!
//! Every player-scoped key is built from a fixed number of vocabulary fields
//! followed by the free-form player id as the final field. No vocabulary
//! value contains [`SEP`], so two distinct input tuples can never render to
//! the same key.

use crate::error::AppError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SEP: char = ':';

pub const REGIONS: &[&str] = &[
    "na1", "br1", "la1", "la2", "euw1", "eun1", "tr1", "ru", "kr", "jp1", "oc1", "ph2", "sg2",
    "th2", "vn2",
];

/// Normal draft, ranked solo, blind pick, ranked flex, ARAM, quickplay.
pub const QUEUE_IDS: &[u16] = &[400, 420, 430, 440, 450, 490];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueFilter {
    All,
    Queue(u16),
}

impl fmt::Display for QueueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueFilter::All => write!(f, "all"),
            QueueFilter::Queue(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for QueueFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(QueueFilter::All);
        }
        s.parse::<u16>()
            .map(QueueFilter::Queue)
            .map_err(|_| AppError::InvalidDimension(format!("queue filter '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFilter {
    All,
    Ranked,
}

impl TypeFilter {
    pub const ALL: [TypeFilter; 2] = [TypeFilter::All, TypeFilter::Ranked];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeFilter::All => "all",
            TypeFilter::Ranked => "ranked",
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TypeFilter::All),
            "ranked" => Ok(TypeFilter::Ranked),
            _ => Err(AppError::InvalidDimension(format!("type filter '{}'", s))),
        }
    }
}

/// A calendar-year window over `gameCreation`, or no window at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    All,
    Year(i32),
}

impl Season {
    /// Half-open `[start, end)` window in epoch milliseconds.
    pub fn window(&self) -> Option<(i64, i64)> {
        match self {
            Season::All => None,
            Season::Year(year) => {
                let start = year_start(*year)?;
                let end = year_start(year.checked_add(1)?)?;
                Some((start.timestamp_millis(), end.timestamp_millis()))
            }
        }
    }

    /// A year outside chrono's calendar matches nothing.
    pub fn contains(&self, game_creation_ms: i64) -> bool {
        match (self, self.window()) {
            (Season::All, _) => true,
            (Season::Year(_), None) => false,
            (Season::Year(_), Some((start, end))) => {
                game_creation_ms >= start && game_creation_ms < end
            }
        }
    }
}

fn year_start(year: i32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::All => write!(f, "all"),
            Season::Year(year) => write!(f, "{}", year),
        }
    }
}

impl FromStr for Season {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Season::All);
        }
        s.parse::<i32>()
            .map(Season::Year)
            .map_err(|_| AppError::InvalidDimension(format!("season '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneId {
    YearInReview,
    Weaknesses,
    Strengths,
    ChampionPool,
    Playstyle,
    Vision,
    Farming,
    Consistency,
    Streaks,
    Momentum,
}

impl SceneId {
    pub const ALL: [SceneId; 10] = [
        SceneId::YearInReview,
        SceneId::Weaknesses,
        SceneId::Strengths,
        SceneId::ChampionPool,
        SceneId::Playstyle,
        SceneId::Vision,
        SceneId::Farming,
        SceneId::Consistency,
        SceneId::Streaks,
        SceneId::Momentum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneId::YearInReview => "year-in-review",
            SceneId::Weaknesses => "weaknesses",
            SceneId::Strengths => "strengths",
            SceneId::ChampionPool => "champion-pool",
            SceneId::Playstyle => "playstyle",
            SceneId::Vision => "vision",
            SceneId::Farming => "farming",
            SceneId::Consistency => "consistency",
            SceneId::Streaks => "streaks",
            SceneId::Momentum => "momentum",
        }
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SceneId::ALL
            .iter()
            .copied()
            .find(|scene| scene.as_str() == s)
            .ok_or_else(|| AppError::InvalidDimension(format!("scene '{}'", s)))
    }
}

/// One (region, queue, type) combination of the raw match-id namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionTuple {
    pub region: String,
    pub queue: QueueFilter,
    pub match_type: TypeFilter,
}

pub fn match_ids_key(player_id: &str, region: &str, queue: QueueFilter, match_type: TypeFilter) -> String {
    format!("ids{SEP}{region}{SEP}{queue}{SEP}{match_type}{SEP}{player_id}")
}

pub fn summary_key(
    player_id: &str,
    region: &str,
    queue: QueueFilter,
    match_type: TypeFilter,
    season: Season,
) -> String {
    format!("summary{SEP}{region}{SEP}{queue}{SEP}{match_type}{SEP}{season}{SEP}{player_id}")
}

pub fn scene_key(player_id: &str, scene: SceneId) -> String {
    format!("scene{SEP}{scene}{SEP}{player_id}")
}

pub fn not_found_key(player_id: &str) -> String {
    format!("missing{SEP}{player_id}")
}

/// Match records are shared across players and never invalidated.
pub fn match_key(region: &str, match_id: &str) -> String {
    format!("match{SEP}{region}{SEP}{match_id}")
}

/// The closed vocabulary every player-scoped key is drawn from.
#[derive(Debug, Clone)]
pub struct KeySpace {
    pub regions: Vec<String>,
    pub queues: Vec<QueueFilter>,
    pub types: Vec<TypeFilter>,
    pub seasons: Vec<Season>,
    pub scenes: Vec<SceneId>,
}

impl Default for KeySpace {
    fn default() -> Self {
        KeySpace::with_seasons(&[])
    }
}

impl KeySpace {
    pub fn with_seasons(years: &[i32]) -> Self {
        let mut queues = vec![QueueFilter::All];
        queues.extend(QUEUE_IDS.iter().map(|id| QueueFilter::Queue(*id)));

        let mut seasons = vec![Season::All];
        seasons.extend(years.iter().map(|y| Season::Year(*y)));

        KeySpace {
            regions: REGIONS.iter().map(|r| r.to_string()).collect(),
            queues,
            types: TypeFilter::ALL.to_vec(),
            seasons,
            scenes: SceneId::ALL.to_vec(),
        }
    }

    pub fn dimension_tuples(&self) -> impl Iterator<Item = DimensionTuple> + '_ {
        self.regions.iter().flat_map(move |region| {
            self.queues.iter().flat_map(move |queue| {
                self.types.iter().map(move |match_type| DimensionTuple {
                    region: region.clone(),
                    queue: *queue,
                    match_type: *match_type,
                })
            })
        })
    }

    /// Every key derived, directly or indirectly, from one player's match history.
    pub fn player_keys(&self, player_id: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for tuple in self.dimension_tuples() {
            keys.push(match_ids_key(player_id, &tuple.region, tuple.queue, tuple.match_type));
            for season in &self.seasons {
                keys.push(summary_key(
                    player_id,
                    &tuple.region,
                    tuple.queue,
                    tuple.match_type,
                    *season,
                ));
            }
        }
        for scene in &self.scenes {
            keys.push(scene_key(player_id, *scene));
        }
        keys.push(not_found_key(player_id));
        keys
    }

    /// Summary and scene keys: the entries computed from match history.
    pub fn derived_keys(&self, player_id: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for tuple in self.dimension_tuples() {
            for season in &self.seasons {
                keys.push(summary_key(
                    player_id,
                    &tuple.region,
                    tuple.queue,
                    tuple.match_type,
                    *season,
                ));
            }
        }
        for scene in &self.scenes {
            keys.push(scene_key(player_id, *scene));
        }
        keys
    }

    pub fn validate_region(&self, region: &str) -> Result<(), AppError> {
        if self.regions.iter().any(|r| r == region) {
            Ok(())
        } else {
            Err(AppError::InvalidDimension(format!("region '{}'", region)))
        }
    }

    pub fn validate(
        &self,
        region: &str,
        queue: QueueFilter,
        match_type: TypeFilter,
        season: Season,
    ) -> Result<(), AppError> {
        self.validate_region(region)?;
        if !self.queues.contains(&queue) {
            return Err(AppError::InvalidDimension(format!("queue filter '{}'", queue)));
        }
        if !self.types.contains(&match_type) {
            return Err(AppError::InvalidDimension(format!("type filter '{}'", match_type)));
        }
        if !self.seasons.contains(&season) {
            return Err(AppError::InvalidDimension(format!("season '{}'", season)));
        }
        Ok(())
    }
}
