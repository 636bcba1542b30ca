use crate::error::AppError;
use crate::keys::KeySpace;
use crate::store::FileStore;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TtlConfig {
    pub match_ids: Duration,
    pub summary: Duration,
    pub scene: Duration,
    pub match_record: Duration,
    pub not_found: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        TtlConfig {
            match_ids: Duration::from_secs(600),
            summary: Duration::from_secs(600),
            scene: Duration::from_secs(3600),
            // Match history never changes once recorded.
            match_record: Duration::from_secs(30 * 24 * 3600),
            not_found: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub region: String,
    pub match_count: usize,
    pub fetch_concurrency: usize,
    pub ttl: TtlConfig,
    pub seasons: Vec<i32>,
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: String::new(),
            region: "na1".to_string(),
            match_count: 20,
            fetch_concurrency: 4,
            ttl: TtlConfig::default(),
            seasons: Vec::new(),
            cache_dir: FileStore::default_dir(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_key = env::var("RIOT_API_KEY").map_err(|_| {
            AppError::ConfigError(
                "RIOT_API_KEY not found in .env file".to_string(),
            )
        })?;

        let defaults = Config::default();
        let ttl = TtlConfig {
            match_ids: secs_var("TTL_MATCH_IDS_SECS", defaults.ttl.match_ids)?,
            summary: secs_var("TTL_SUMMARY_SECS", defaults.ttl.summary)?,
            scene: secs_var("TTL_SCENE_SECS", defaults.ttl.scene)?,
            match_record: secs_var("TTL_MATCH_SECS", defaults.ttl.match_record)?,
            not_found: secs_var("TTL_NOT_FOUND_SECS", defaults.ttl.not_found)?,
        };

        let seasons = match env::var("MATCH_SEASONS") {
            Ok(raw) => parse_seasons(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Config {
            api_key,
            region: env::var("RIOT_REGION").unwrap_or(defaults.region),
            match_count: parse_var("MATCH_COUNT", defaults.match_count)?.clamp(1, 100),
            fetch_concurrency: parse_var("FETCH_CONCURRENCY", defaults.fetch_concurrency)?.max(1),
            ttl,
            seasons,
            cache_dir: env::var("MATCH_INSIGHTS_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        })
    }

    pub fn key_space(&self) -> KeySpace {
        KeySpace::with_seasons(&self.seasons)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("{} must be a number, got '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

fn secs_var(name: &str, default: Duration) -> Result<Duration, AppError> {
    parse_var(name, default.as_secs()).map(Duration::from_secs)
}

fn parse_seasons(raw: &str) -> Result<Vec<i32>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map_err(|_| AppError::ConfigError(format!("invalid season year '{}'", s)))
        })
        .collect()
}
