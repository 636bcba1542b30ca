use serde::{Deserialize, Serialize};

/// One completed game. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    /// Epoch milliseconds.
    pub game_creation: i64,
    pub game_duration_seconds: u64,
    pub game_mode: String,
    #[serde(default)]
    pub queue_id: u16,
    pub participants: Vec<ParticipantRecord>,
}

impl MatchRecord {
    pub fn duration_minutes(&self) -> f64 {
        self.game_duration_seconds as f64 / 60.0
    }

    pub fn participant(&self, player_id: &str) -> Option<&ParticipantRecord> {
        self.participants.iter().find(|p| p.player_id == player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub player_id: String,
    pub character_id: String,
    #[serde(default)]
    pub team_id: i32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub wards_placed: u32,
    pub wards_killed: u32,
    pub gold_earned: u32,
    pub minions_killed: u32,
    pub jungle_minions_killed: u32,
    pub damage_to_opponents: u64,
    pub vision_score: u32,
    pub won: bool,
}

impl ParticipantRecord {
    pub fn creep_score(&self) -> u32 {
        self.minions_killed + self.jungle_minions_killed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub character_id: String,
    pub games: u32,
    pub wins: u32,
    pub win_rate: f64,
    pub avg_kda: f64,
}

/// Derived snapshot. Always replaced wholesale on recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerStatsSummary {
    pub player_id: String,
    pub total_games: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub avg_kda: f64,
    pub avg_kills: f64,
    pub avg_deaths: f64,
    pub avg_assists: f64,
    pub avg_damage_per_minute: f64,
    pub avg_vision_score: f64,
    pub avg_wards_placed: f64,
    pub avg_wards_killed: f64,
    pub avg_gold_per_minute: f64,
    pub avg_cs_per_minute: f64,
    /// Most recent first, at most ten entries.
    pub recent_form: Vec<bool>,
    pub character_stats: Vec<CharacterStats>,
}

impl PlayerStatsSummary {
    pub fn empty(player_id: &str) -> Self {
        PlayerStatsSummary {
            player_id: player_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_games == 0
    }
}

/// (kills + assists) / max(deaths, 1)
pub fn kda(kills: f64, deaths: f64, assists: f64) -> f64 {
    (kills + assists) / deaths.max(1.0)
}

/// Zero when there is nothing to divide by.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
