use crate::model::{kda, ratio, CharacterStats, MatchRecord, ParticipantRecord, PlayerStatsSummary};
use std::collections::BTreeMap;

pub const RECENT_FORM_LEN: usize = 10;

#[derive(Debug, Clone, Default)]
struct CharacterTotals {
    games: u32,
    wins: u32,
    kills: u64,
    deaths: u64,
    assists: u64,
}

impl CharacterTotals {
    fn finish(&self, character_id: &str) -> CharacterStats {
        let games = self.games as f64;
        CharacterStats {
            character_id: character_id.to_string(),
            games: self.games,
            wins: self.wins,
            win_rate: ratio(self.wins as f64, games),
            avg_kda: kda(
                ratio(self.kills as f64, games),
                ratio(self.deaths as f64, games),
                ratio(self.assists as f64, games),
            ),
        }
    }
}

/// Streaming fold over one player's matches, fed most recent first.
#[derive(Debug, Clone)]
pub struct StatsTracker {
    player_id: String,
    games: u32,
    wins: u32,
    kills: u64,
    deaths: u64,
    assists: u64,
    vision: u64,
    wards_placed: u64,
    wards_killed: u64,
    // Sums of per-match rates, so long games do not dominate.
    damage_per_minute: f64,
    gold_per_minute: f64,
    cs_per_minute: f64,
    recent_form: Vec<bool>,
    characters: BTreeMap<String, CharacterTotals>,
}

impl StatsTracker {
    pub fn new(player_id: &str) -> Self {
        StatsTracker {
            player_id: player_id.to_string(),
            games: 0,
            wins: 0,
            kills: 0,
            deaths: 0,
            assists: 0,
            vision: 0,
            wards_placed: 0,
            wards_killed: 0,
            damage_per_minute: 0.0,
            gold_per_minute: 0.0,
            cs_per_minute: 0.0,
            recent_form: Vec::with_capacity(RECENT_FORM_LEN),
            characters: BTreeMap::new(),
        }
    }

    /// Folds one match in. Returns false when the player is not in it.
    pub fn add_match(&mut self, record: &MatchRecord) -> bool {
        let Some(player) = record.participant(&self.player_id) else {
            tracing::warn!(
                match_id = %record.match_id,
                player_id = %self.player_id,
                "player missing from match, skipping"
            );
            return false;
        };
        self.add_participant(player, record.duration_minutes());
        true
    }

    fn add_participant(&mut self, p: &ParticipantRecord, minutes: f64) {
        self.games += 1;
        if p.won {
            self.wins += 1;
        }
        self.kills += p.kills as u64;
        self.deaths += p.deaths as u64;
        self.assists += p.assists as u64;
        self.vision += p.vision_score as u64;
        self.wards_placed += p.wards_placed as u64;
        self.wards_killed += p.wards_killed as u64;

        // A zero-length game contributes no rate but still counts as played.
        self.damage_per_minute += ratio(p.damage_to_opponents as f64, minutes);
        self.gold_per_minute += ratio(p.gold_earned as f64, minutes);
        self.cs_per_minute += ratio(p.creep_score() as f64, minutes);

        if self.recent_form.len() < RECENT_FORM_LEN {
            self.recent_form.push(p.won);
        }

        let entry = self.characters.entry(p.character_id.clone()).or_default();
        entry.games += 1;
        if p.won {
            entry.wins += 1;
        }
        entry.kills += p.kills as u64;
        entry.deaths += p.deaths as u64;
        entry.assists += p.assists as u64;
    }

    pub fn finish(self) -> PlayerStatsSummary {
        let games = self.games as f64;
        let avg_kills = ratio(self.kills as f64, games);
        let avg_deaths = ratio(self.deaths as f64, games);
        let avg_assists = ratio(self.assists as f64, games);

        let mut character_stats: Vec<CharacterStats> = self
            .characters
            .iter()
            .map(|(id, totals)| totals.finish(id))
            .collect();
        character_stats.sort_by(|a, b| {
            b.games
                .cmp(&a.games)
                .then_with(|| a.character_id.cmp(&b.character_id))
        });

        PlayerStatsSummary {
            player_id: self.player_id,
            total_games: self.games,
            wins: self.wins,
            losses: self.games - self.wins,
            win_rate: ratio(self.wins as f64, games),
            avg_kda: kda(avg_kills, avg_deaths, avg_assists),
            avg_kills,
            avg_deaths,
            avg_assists,
            avg_damage_per_minute: ratio(self.damage_per_minute, games),
            avg_vision_score: ratio(self.vision as f64, games),
            avg_wards_placed: ratio(self.wards_placed as f64, games),
            avg_wards_killed: ratio(self.wards_killed as f64, games),
            avg_gold_per_minute: ratio(self.gold_per_minute, games),
            avg_cs_per_minute: ratio(self.cs_per_minute, games),
            recent_form: self.recent_form,
            character_stats,
        }
    }
}

/// Reduces matches, most recent first, to a summary. Never fails: matches
/// without the player are skipped and no matches yields the empty summary.
pub fn aggregate<'a, I>(player_id: &str, matches: I) -> PlayerStatsSummary
where
    I: IntoIterator<Item = &'a MatchRecord>,
{
    let mut tracker = StatsTracker::new(player_id);
    for record in matches {
        tracker.add_match(record);
    }
    tracker.finish()
}
