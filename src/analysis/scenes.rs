use super::aggregate::{aggregate, RECENT_FORM_LEN};
use crate::keys::SceneId;
use crate::model::{kda, ratio, CharacterStats, MatchRecord, ParticipantRecord, PlayerStatsSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub label: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

impl Highlight {
    fn new(label: &str, value: f64) -> Self {
        Highlight {
            label: label.to_string(),
            value,
            character: None,
        }
    }

    fn for_character(label: &str, value: f64, character: &str) -> Self {
        Highlight {
            label: label.to_string(),
            value,
            character: Some(character.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    pub scene: SceneId,
    pub player_id: String,
    /// Platform the history came from; empty until set by the caller.
    #[serde(default)]
    pub region: String,
    pub games: u32,
    pub highlights: Vec<Highlight>,
}

impl SceneReport {
    pub fn in_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }
}

/// The player's own rows, most recent first, paired with match duration in minutes.
fn player_rows<'a>(player_id: &str, matches: &'a [MatchRecord]) -> Vec<(&'a ParticipantRecord, f64)> {
    matches
        .iter()
        .filter_map(|m| m.participant(player_id).map(|p| (p, m.duration_minutes())))
        .collect()
}

pub fn compute_scene(scene: SceneId, player_id: &str, matches: &[MatchRecord]) -> SceneReport {
    let summary = aggregate(player_id, matches);
    let rows = player_rows(player_id, matches);

    let highlights = match scene {
        SceneId::YearInReview => year_in_review(&summary, matches, player_id),
        SceneId::Weaknesses => weaknesses(&summary, &rows),
        SceneId::Strengths => strengths(&summary),
        SceneId::ChampionPool => champion_pool(&summary),
        SceneId::Playstyle => playstyle(&summary),
        SceneId::Vision => vision(&summary),
        SceneId::Farming => farming(&summary),
        SceneId::Consistency => consistency(&rows),
        SceneId::Streaks => streaks(&rows),
        SceneId::Momentum => momentum(&summary),
    };

    SceneReport {
        scene,
        player_id: player_id.to_string(),
        region: String::new(),
        games: summary.total_games,
        highlights,
    }
}

fn year_in_review(summary: &PlayerStatsSummary, matches: &[MatchRecord], player_id: &str) -> Vec<Highlight> {
    let seconds: u64 = matches
        .iter()
        .filter(|m| m.participant(player_id).is_some())
        .map(|m| m.game_duration_seconds)
        .sum();

    let mut out = vec![
        Highlight::new("games", summary.total_games as f64),
        Highlight::new("wins", summary.wins as f64),
        Highlight::new("hours played", seconds as f64 / 3600.0),
    ];
    if let Some(top) = summary.character_stats.first() {
        out.push(Highlight::for_character("most played", top.games as f64, &top.character_id));
    }
    out
}

/// Score = 0.4 × frequency + 0.5 × (1 − win rate) + 0.1 × recency (normalized to 0-1)
fn weakness_score(stats: &CharacterStats, total_games: u32, recency: f64, max_recency: f64) -> f64 {
    let frequency = ratio(stats.games as f64, total_games as f64);
    let recency_normalized = ratio(recency, max_recency);
    (0.4 * frequency) + (0.5 * (1.0 - stats.win_rate)) + (0.1 * recency_normalized)
}

fn weaknesses(summary: &PlayerStatsSummary, rows: &[(&ParticipantRecord, f64)]) -> Vec<Highlight> {
    // Recency weight decays linearly from 1 for the newest game.
    let mut recency: BTreeMap<&str, f64> = BTreeMap::new();
    for (idx, (p, _)) in rows.iter().enumerate() {
        *recency.entry(p.character_id.as_str()).or_default() += 1.0 - (idx as f64 / rows.len() as f64);
    }
    let max_recency = recency.values().copied().fold(0.0, f64::max);

    let mut scored: Vec<(&CharacterStats, f64)> = summary
        .character_stats
        .iter()
        .map(|c| {
            let r = recency.get(c.character_id.as_str()).copied().unwrap_or(0.0);
            (c, weakness_score(c, summary.total_games, r, max_recency))
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| a.0.character_id.cmp(&b.0.character_id))
    });

    scored
        .into_iter()
        .take(5)
        .map(|(c, score)| Highlight::for_character("weakness score", score, &c.character_id))
        .collect()
}

fn strengths(summary: &PlayerStatsSummary) -> Vec<Highlight> {
    let mut eligible: Vec<&CharacterStats> =
        summary.character_stats.iter().filter(|c| c.games >= 2).collect();
    eligible.sort_by(|a, b| {
        b.win_rate
            .total_cmp(&a.win_rate)
            .then_with(|| b.games.cmp(&a.games))
            .then_with(|| a.character_id.cmp(&b.character_id))
    });
    eligible
        .into_iter()
        .take(3)
        .map(|c| Highlight::for_character("win rate", c.win_rate, &c.character_id))
        .collect()
}

fn champion_pool(summary: &PlayerStatsSummary) -> Vec<Highlight> {
    let top3: u32 = summary.character_stats.iter().take(3).map(|c| c.games).sum();
    vec![
        Highlight::new("distinct characters", summary.character_stats.len() as f64),
        Highlight::new("top 3 share", ratio(top3 as f64, summary.total_games as f64)),
    ]
}

fn playstyle(summary: &PlayerStatsSummary) -> Vec<Highlight> {
    vec![
        Highlight::new(
            "kill share",
            ratio(summary.avg_kills, summary.avg_kills + summary.avg_assists),
        ),
        Highlight::new("avg kda", summary.avg_kda),
        Highlight::new("damage per minute", summary.avg_damage_per_minute),
    ]
}

fn vision(summary: &PlayerStatsSummary) -> Vec<Highlight> {
    vec![
        Highlight::new("vision score", summary.avg_vision_score),
        Highlight::new("wards placed", summary.avg_wards_placed),
        Highlight::new("wards killed", summary.avg_wards_killed),
    ]
}

fn farming(summary: &PlayerStatsSummary) -> Vec<Highlight> {
    vec![
        Highlight::new("cs per minute", summary.avg_cs_per_minute),
        Highlight::new("gold per minute", summary.avg_gold_per_minute),
    ]
}

fn consistency(rows: &[(&ParticipantRecord, f64)]) -> Vec<Highlight> {
    let per_game: Vec<f64> = rows
        .iter()
        .map(|(p, _)| kda(p.kills as f64, p.deaths as f64, p.assists as f64))
        .collect();
    let n = per_game.len() as f64;
    let mean = ratio(per_game.iter().sum(), n);
    let variance = ratio(per_game.iter().map(|v| (v - mean).powi(2)).sum(), n);
    vec![
        Highlight::new("kda mean", mean),
        Highlight::new("kda std dev", variance.sqrt()),
    ]
}

fn streaks(rows: &[(&ParticipantRecord, f64)]) -> Vec<Highlight> {
    let mut longest_win = 0u32;
    let mut longest_loss = 0u32;
    let mut run = 0u32;
    let mut last: Option<bool> = None;

    for (p, _) in rows {
        run = if last == Some(p.won) { run + 1 } else { 1 };
        last = Some(p.won);
        if p.won {
            longest_win = longest_win.max(run);
        } else {
            longest_loss = longest_loss.max(run);
        }
    }

    // Positive for a win streak, negative for a loss streak, counted from the newest game.
    let current = match rows.first() {
        Some((first, _)) => {
            let len = rows.iter().take_while(|(p, _)| p.won == first.won).count() as f64;
            if first.won {
                len
            } else {
                -len
            }
        }
        None => 0.0,
    };

    vec![
        Highlight::new("longest win streak", longest_win as f64),
        Highlight::new("longest loss streak", longest_loss as f64),
        Highlight::new("current streak", current),
    ]
}

fn momentum(summary: &PlayerStatsSummary) -> Vec<Highlight> {
    let recent_wins = summary.recent_form.iter().filter(|w| **w).count();
    let recent = ratio(recent_wins as f64, summary.recent_form.len() as f64);
    vec![
        Highlight::new(&format!("last {} win rate", RECENT_FORM_LEN), recent),
        Highlight::new("overall win rate", summary.win_rate),
        Highlight::new("delta", recent - summary.win_rate),
    ]
}
