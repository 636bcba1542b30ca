use crate::error::AppError;
use crate::model::{MatchRecord, ParticipantRecord};
use serde::Deserialize;

// Account V1 response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub puuid: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub tag_line: String,
}

// Match V5 response
#[derive(Debug, Deserialize)]
pub struct MatchDto {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    #[serde(default)]
    pub game_creation: i64,
    pub game_duration: i64,
    #[serde(default)]
    pub game_mode: String,
    #[serde(default)]
    pub queue_id: u16,
    pub participants: Vec<ParticipantDto>,
}

// Everything optional so one bad row does not sink the whole match.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub puuid: Option<String>,
    pub champion_name: Option<String>,
    #[serde(default)]
    pub team_id: i32,
    pub win: Option<bool>,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
    pub assists: Option<u32>,
    #[serde(default)]
    pub wards_placed: u32,
    #[serde(default)]
    pub wards_killed: u32,
    #[serde(default)]
    pub gold_earned: u32,
    #[serde(default)]
    pub total_minions_killed: u32,
    #[serde(default)]
    pub neutral_minions_killed: u32,
    #[serde(default)]
    pub total_damage_dealt_to_champions: u64,
    #[serde(default)]
    pub vision_score: u32,
}

fn required<T>(value: Option<T>, field: &str, match_id: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::MalformedRecord(format!("{}: participant missing {}", match_id, field)))
}

impl ParticipantDto {
    pub fn into_record(self, match_id: &str) -> Result<ParticipantRecord, AppError> {
        Ok(ParticipantRecord {
            player_id: required(self.puuid, "puuid", match_id)?,
            character_id: required(self.champion_name, "championName", match_id)?,
            team_id: self.team_id,
            kills: required(self.kills, "kills", match_id)?,
            deaths: required(self.deaths, "deaths", match_id)?,
            assists: required(self.assists, "assists", match_id)?,
            wards_placed: self.wards_placed,
            wards_killed: self.wards_killed,
            gold_earned: self.gold_earned,
            minions_killed: self.total_minions_killed,
            jungle_minions_killed: self.neutral_minions_killed,
            damage_to_opponents: self.total_damage_dealt_to_champions,
            vision_score: self.vision_score,
            won: required(self.win, "win", match_id)?,
        })
    }
}

impl MatchDto {
    /// Malformed participants are dropped; the rest of the match is kept.
    pub fn into_record(self) -> MatchRecord {
        let match_id = self.metadata.match_id;
        let participants = self
            .info
            .participants
            .into_iter()
            .filter_map(|p| match p.into_record(&match_id) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping participant");
                    None
                }
            })
            .collect();

        MatchRecord {
            game_creation: self.info.game_creation,
            game_duration_seconds: self.info.game_duration.max(0) as u64,
            game_mode: self.info.game_mode,
            queue_id: self.info.queue_id,
            participants,
            match_id,
        }
    }
}
