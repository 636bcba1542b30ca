//! Match-history statistics with a coherent cache in front of a rate-limited
//! upstream API.

pub mod analysis;
pub mod api;
pub mod coalesce;
pub mod config;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod keys;
pub mod model;
pub mod orchestrator;
pub mod store;

pub use analysis::{aggregate, compute_scene, SceneReport};
pub use config::Config;
pub use error::AppError;
pub use fetcher::MatchFetcher;
pub use keys::{KeySpace, QueueFilter, SceneId, Season, TypeFilter};
pub use model::{CharacterStats, MatchRecord, ParticipantRecord, PlayerStatsSummary};
pub use orchestrator::{CacheOrchestrator, InvalidationReport, StatsQuery};
pub use store::{CacheStore, FileStore, MemoryStore};
