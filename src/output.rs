use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::accumulate::ClanCareerStats;
use crate::scoring::PlayerScorecard;
use crate::tags;

/// Serializes the final player list, family summary, and per-clan files.
/// All numeric rounding happens here, at the edge; accumulation and scoring
/// stay unrounded so errors never compound.
pub struct OutputWriter {
    out_dir: PathBuf,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReliabilityOut {
    performance: f64,
    attendance: f64,
    league_adjustment: f64,
    weighted: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BestSeasonOut {
    season: String,
    stars: u32,
    avg_stars: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeagueStintOut {
    league: String,
    seasons: u32,
    attacks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerOut {
    tag: String,
    name: String,
    clan_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    town_hall: Option<u32>,
    seasons_played: u32,
    wars: u32,
    attacks: u32,
    stars: u32,
    destruction: f64,
    triples: u32,
    avg_stars: f64,
    avg_destruction: f64,
    three_star_rate: f64,
    reliability: ReliabilityOut,
    missed_attacks: i64,
    times_attacked: u32,
    stars_allowed: u32,
    triples_allowed: u32,
    defense_quality: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    best_season: Option<BestSeasonOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trend: Option<&'static str>,
    league_history: Vec<LeagueStintOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_league: Option<String>,
}

impl PlayerOut {
    fn from_scorecard(card: &PlayerScorecard) -> Self {
        Self {
            tag: card.tag.clone(),
            name: card.name.clone(),
            clan_tag: card.clan_tag.clone(),
            town_hall: card.town_hall,
            seasons_played: card.seasons_played,
            wars: card.wars,
            attacks: card.attacks,
            stars: card.stars,
            destruction: round2(card.destruction),
            triples: card.triples,
            avg_stars: round2(card.avg_stars),
            avg_destruction: round2(card.avg_destruction),
            three_star_rate: round2(card.three_star_rate),
            reliability: ReliabilityOut {
                performance: round2(card.reliability.performance),
                attendance: round2(card.reliability.attendance),
                league_adjustment: round2(card.reliability.league_adjustment),
                weighted: round2(card.reliability.weighted),
            },
            missed_attacks: card.missed_attacks,
            times_attacked: card.times_attacked,
            stars_allowed: card.stars_allowed,
            triples_allowed: card.triples_allowed,
            defense_quality: round2(card.defense_quality),
            best_season: card.best_season.as_ref().map(|best| BestSeasonOut {
                season: best.season.clone(),
                stars: best.stars,
                avg_stars: round2(best.avg_stars),
            }),
            trend: card.trend.map(|t| t.label()),
            league_history: card
                .league_history
                .iter()
                .map(|stint| LeagueStintOut {
                    league: stint.league.clone(),
                    seasons: stint.seasons,
                    attacks: stint.attacks,
                })
                .collect(),
            primary_league: card.primary_league.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClanSeasonOut {
    season: String,
    wars: u32,
    wins: u32,
    losses: u32,
    ties: u32,
    stars: u32,
    destruction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    league: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClanSummaryOut {
    name: String,
    tag: String,
    wars_won: u32,
    wars_lost: u32,
    wars_tied: u32,
    total_wars: u32,
    win_rate: f64,
    stars: u32,
    destruction: f64,
    attacks: u32,
    members: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    league: Option<String>,
}

impl ClanSummaryOut {
    fn from_stats(clan: &ClanCareerStats) -> Self {
        let decided = clan.wars_won + clan.wars_lost + clan.wars_tied;
        let win_rate = if decided == 0 {
            0.0
        } else {
            f64::from(clan.wars_won) / f64::from(decided) * 100.0
        };
        Self {
            name: clan.name.clone(),
            tag: clan.tag.clone(),
            wars_won: clan.wars_won,
            wars_lost: clan.wars_lost,
            wars_tied: clan.wars_tied,
            total_wars: clan.total_wars,
            win_rate: round2(win_rate),
            stars: clan.stars,
            destruction: round2(clan.destruction),
            attacks: clan.attacks,
            members: clan.members.len(),
            league: latest_league(clan),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FamilyTotalsOut {
    wars_won: u32,
    wars_lost: u32,
    wars_tied: u32,
    total_wars: u32,
    win_rate: f64,
    stars: u32,
    attacks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FamilySummaryOut {
    generated_at: String,
    clans: Vec<ClanSummaryOut>,
    totals: FamilyTotalsOut,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClanFileOut {
    #[serde(flatten)]
    summary: ClanSummaryOut,
    seasons: Vec<ClanSeasonOut>,
    players: Vec<PlayerOut>,
}

fn latest_league(clan: &ClanCareerStats) -> Option<String> {
    clan.seasons
        .iter()
        .rev()
        .find_map(|season| season.league.clone())
}

impl OutputWriter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn default_dir() -> PathBuf {
        std::env::var("CWL_STATS_OUT_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("out"))
    }

    /// Write every output file. Called exactly once, after all accumulation
    /// and enrichment; nothing here runs on a failed run.
    pub fn write_all(
        &self,
        scorecards: &[PlayerScorecard],
        clans: &[ClanCareerStats],
    ) -> Result<()> {
        let mut players: Vec<PlayerOut> =
            scorecards.iter().map(PlayerOut::from_scorecard).collect();
        players.sort_by(|a, b| b.stars.cmp(&a.stars));
        self.write_json(&self.out_dir.join("players.json"), &players)?;

        let summary = FamilySummaryOut {
            generated_at: Utc::now().to_rfc3339(),
            clans: clans.iter().map(ClanSummaryOut::from_stats).collect(),
            totals: family_totals(clans),
        };
        self.write_json(&self.out_dir.join("family_summary.json"), &summary)?;

        for clan in clans {
            let mut clan_players: Vec<PlayerOut> = scorecards
                .iter()
                .filter(|card| tags::tags_equal(&card.clan_tag, &clan.tag))
                .map(PlayerOut::from_scorecard)
                .collect();
            clan_players.sort_by(|a, b| b.stars.cmp(&a.stars));
            let file = ClanFileOut {
                summary: ClanSummaryOut::from_stats(clan),
                seasons: clan
                    .seasons
                    .iter()
                    .map(|season| ClanSeasonOut {
                        season: season.season.clone(),
                        wars: season.wars,
                        wins: season.wins,
                        losses: season.losses,
                        ties: season.ties,
                        stars: season.stars,
                        destruction: round2(season.destruction),
                        league: season.league.clone(),
                    })
                    .collect(),
                players: clan_players,
            };
            let path = self
                .out_dir
                .join("clans")
                .join(format!("{}.json", tags::file_key(&clan.tag)));
            self.write_json(&path, &file)?;
        }

        info!(dir = %self.out_dir.display(), players = players.len(), "wrote output files");
        Ok(())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create output dir")?;
        }
        let json = serde_json::to_string_pretty(value).context("serialize output")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).context("write output file")?;
        fs::rename(&tmp, path).context("swap output file")?;
        Ok(())
    }
}

fn family_totals(clans: &[ClanCareerStats]) -> FamilyTotalsOut {
    let mut totals = FamilyTotalsOut {
        wars_won: 0,
        wars_lost: 0,
        wars_tied: 0,
        total_wars: 0,
        win_rate: 0.0,
        stars: 0,
        attacks: 0,
    };
    for clan in clans {
        totals.wars_won += clan.wars_won;
        totals.wars_lost += clan.wars_lost;
        totals.wars_tied += clan.wars_tied;
        totals.total_wars += clan.total_wars;
        totals.stars += clan.stars;
        totals.attacks += clan.attacks;
    }
    let decided = totals.wars_won + totals.wars_lost + totals.wars_tied;
    if decided > 0 {
        totals.win_rate = round2(f64::from(totals.wars_won) / f64::from(decided) * 100.0);
    }
    totals
}
