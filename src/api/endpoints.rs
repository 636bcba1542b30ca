use crate::keys::{QueueFilter, TypeFilter};

pub const ACCOUNT_ENDPOINT: &str = "https://americas.api.riotgames.com/riot/account/v1/accounts/by-riot-id";

/// Match-v5 is served from the regional cluster, not the platform host.
pub fn regional_routing(region: &str) -> &'static str {
    match region {
        "na1" | "br1" | "la1" | "la2" => "americas",
        "euw1" | "eun1" | "tr1" | "ru" => "europe",
        "kr" | "jp1" => "asia",
        "oc1" | "ph2" | "sg2" | "th2" | "vn2" => "sea",
        _ => "americas", // default
    }
}

pub fn account_url(game_name: &str, tag_line: &str) -> String {
    format!(
        "{}/{}/{}",
        ACCOUNT_ENDPOINT,
        urlencoding::encode(game_name),
        urlencoding::encode(tag_line)
    )
}

pub fn match_ids_url(
    region: &str,
    puuid: &str,
    queue: QueueFilter,
    match_type: TypeFilter,
    start: usize,
    count: usize,
) -> String {
    let mut url = format!(
        "https://{}.api.riotgames.com/lol/match/v5/matches/by-puuid/{}/ids?start={}&count={}",
        regional_routing(region),
        puuid,
        start,
        count
    );
    if let QueueFilter::Queue(id) = queue {
        url.push_str(&format!("&queue={}", id));
    }
    if match_type == TypeFilter::Ranked {
        url.push_str("&type=ranked");
    }
    url
}

pub fn match_url(region: &str, match_id: &str) -> String {
    format!(
        "https://{}.api.riotgames.com/lol/match/v5/matches/{}",
        regional_routing(region),
        match_id
    )
}
