use crate::error::AppError;
use crate::keys::{QueueFilter, TypeFilter};
use crate::model::MatchRecord;

/// Upstream source of match data.
///
/// Implementations must keep "absent" ([`AppError::NotFound`] from
/// `list_match_ids`, `Ok(None)` from `fetch_match_detail`) distinct from
/// transient failures ([`AppError::UpstreamUnavailable`],
/// [`AppError::RateLimited`]) so transient failures are never cached.
pub trait MatchFetcher: Send + Sync {
    /// Match ids for a player, most recent first.
    fn list_match_ids(
        &self,
        player_id: &str,
        region: &str,
        queue: QueueFilter,
        match_type: TypeFilter,
        start: usize,
        count: usize,
    ) -> Result<Vec<String>, AppError>;

    fn fetch_match_detail(&self, match_id: &str, region: &str)
        -> Result<Option<MatchRecord>, AppError>;
}
