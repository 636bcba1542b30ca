use crate::config::Config;
use crate::error::AppError;
use crate::fetcher::MatchFetcher;
use crate::keys::{QueueFilter, TypeFilter};
use crate::model::MatchRecord;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use super::endpoints;
use super::models::*;

const MAX_RETRIES: u32 = 3;

pub struct RiotApiClient {
    config: Config,
    clock: DefaultClock,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RiotApiClient {
    pub fn new(config: Config) -> Self {
        // 20 requests per second, the personal key's burst limit.
        let quota = Quota::per_second(NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN));
        RiotApiClient {
            config,
            clock: DefaultClock::default(),
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    fn wait_for_quota(&self) {
        while let Err(not_until) = self.rate_limiter.check() {
            thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }

    /// GET with retry on 429. `Ok(None)` means the resource does not exist.
    fn execute_request(&self, url: &str) -> Result<Option<String>, AppError> {
        let mut retry_count = 0;

        loop {
            self.wait_for_quota();

            let response = ureq::get(url)
                .set("User-Agent", "match_insights/0.1.0")
                .set("X-Riot-Token", &self.config.api_key)
                .call();

            match response {
                Ok(resp) => {
                    return resp
                        .into_string()
                        .map(Some)
                        .map_err(|e| AppError::UpstreamUnavailable(e.to_string()));
                }
                Err(ureq::Error::Status(404, _)) => return Ok(None),
                Err(ureq::Error::Status(429, _)) => {
                    // Rate limited - wait and retry
                    if retry_count >= MAX_RETRIES {
                        return Err(AppError::RateLimited);
                    }
                    let wait_ms = 2000 * (retry_count + 1) as u64;
                    tracing::warn!(wait_ms, "rate limited, backing off");
                    thread::sleep(Duration::from_millis(wait_ms));
                    retry_count += 1;
                }
                Err(ureq::Error::Status(code @ (401 | 403), _)) => {
                    return Err(AppError::ConfigError(format!(
                        "API key rejected (HTTP {})",
                        code
                    )));
                }
                Err(ureq::Error::Status(code, _)) => {
                    return Err(AppError::UpstreamUnavailable(format!("HTTP {}", code)));
                }
                Err(e) => {
                    return Err(AppError::UpstreamUnavailable(e.to_string()));
                }
            }
        }
    }

    pub fn get_account(&self, game_name: &str, tag_line: &str) -> Result<AccountDto, AppError> {
        let url = endpoints::account_url(game_name, tag_line);

        let body = self
            .execute_request(&url)?
            .ok_or_else(|| AppError::NotFound(format!("{}#{}", game_name, tag_line)))?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl MatchFetcher for RiotApiClient {
    fn list_match_ids(
        &self,
        player_id: &str,
        region: &str,
        queue: QueueFilter,
        match_type: TypeFilter,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, AppError> {
        let url = endpoints::match_ids_url(region, player_id, queue, match_type, start, count);

        let body = self
            .execute_request(&url)?
            .ok_or_else(|| AppError::NotFound(format!("player {}", player_id)))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn fetch_match_detail(
        &self,
        match_id: &str,
        region: &str,
    ) -> Result<Option<MatchRecord>, AppError> {
        let url = endpoints::match_url(region, match_id);

        match self.execute_request(&url)? {
            Some(body) => {
                let dto: MatchDto = serde_json::from_str(&body)?;
                Ok(Some(dto.into_record()))
            }
            None => Ok(None),
        }
    }
}
