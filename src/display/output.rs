use crate::analysis::SceneReport;
use crate::model::PlayerStatsSummary;
use crate::orchestrator::InvalidationReport;
use colored::*;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct OverviewRow {
    metric: String,
    value: String,
}

#[derive(Tabled)]
struct CharacterRow {
    #[tabled(rename = "#")]
    rank: String,
    champion: String,
    games: String,
    win_rate: String,
    kda: String,
}

#[derive(Tabled)]
struct HighlightRow {
    highlight: String,
    champion: String,
    value: String,
}

fn overview_row(metric: &str, value: String) -> OverviewRow {
    OverviewRow {
        metric: metric.to_string(),
        value,
    }
}

fn form_string(form: &[bool]) -> String {
    form.iter()
        .map(|won| {
            if *won {
                "W".green().to_string()
            } else {
                "L".red().to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn display_summary(summary: &PlayerStatsSummary, player_name: &str) {
    println!(
        "\n{}",
        format!("📊 Match Statistics for {} ", player_name).bold().cyan()
    );
    println!("{}\n", "=".repeat(60).cyan());

    if summary.is_empty() {
        println!("{}", "No games found for this filter".yellow());
        return;
    }

    println!(
        "{} {} W / {} L ({:.1}% WR)",
        "📈 Overall:".bold(),
        summary.wins.to_string().green(),
        summary.losses.to_string().red(),
        summary.win_rate * 100.0
    );
    println!("{} {}\n", "🔥 Recent form:".bold(), form_string(&summary.recent_form));

    let rows = vec![
        overview_row("Games", summary.total_games.to_string()),
        overview_row(
            "KDA",
            format!(
                "{:.2} ({:.1} / {:.1} / {:.1})",
                summary.avg_kda, summary.avg_kills, summary.avg_deaths, summary.avg_assists
            ),
        ),
        overview_row("Damage / min", format!("{:.0}", summary.avg_damage_per_minute)),
        overview_row("Gold / min", format!("{:.0}", summary.avg_gold_per_minute)),
        overview_row("CS / min", format!("{:.1}", summary.avg_cs_per_minute)),
        overview_row("Vision score", format!("{:.1}", summary.avg_vision_score)),
        overview_row(
            "Wards placed / killed",
            format!("{:.1} / {:.1}", summary.avg_wards_placed, summary.avg_wards_killed),
        ),
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}\n", table);

    let rows: Vec<CharacterRow> = summary
        .character_stats
        .iter()
        .enumerate()
        .map(|(idx, c)| CharacterRow {
            rank: format!("#{}", idx + 1),
            champion: c.character_id.clone(),
            games: c.games.to_string(),
            win_rate: format!("{:.1}%", c.win_rate * 100.0),
            kda: format!("{:.2}", c.avg_kda),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}\n", table);
}

pub fn display_scene(report: &SceneReport) {
    println!(
        "\n{}",
        format!("🎬 {} ({}, {} games)", report.scene, report.region, report.games).bold().cyan()
    );
    println!("{}\n", "=".repeat(60).cyan());

    if report.highlights.is_empty() {
        println!("{}", "Not enough data for this scene".yellow());
        return;
    }

    let rows: Vec<HighlightRow> = report
        .highlights
        .iter()
        .map(|h| HighlightRow {
            highlight: h.label.clone(),
            champion: h.character.clone().unwrap_or_default(),
            value: format!("{:.2}", h.value),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}\n", table);
}

pub fn display_invalidation(report: &InvalidationReport) {
    display_success(&format!("Cleared {} cache entries", report.cleared_keys.len()));
    if !report.is_complete() {
        println!(
            "{} {} entries could not be deleted:",
            "⚠️".yellow(),
            report.failed_keys.len()
        );
        for key in &report.failed_keys {
            println!("  {}", key);
        }
    }
}

pub fn display_error(error: &str) {
    eprintln!("{} {}", "❌ Error:".red().bold(), error);
}

pub fn display_info(message: &str) {
    println!("{} {}", "ℹ️".cyan(), message);
}

pub fn display_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}
