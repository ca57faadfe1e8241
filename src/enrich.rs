use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::accumulate::{ClanCareerStats, DefenseStats, PlayerLedger};
use crate::scoring::DEFAULT_DEFENSE_QUALITY;
use crate::tags;

/// Per-season per-clan roster export, produced by the roster tooling outside
/// this crate. Consumed best-effort.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RosterEntry {
    #[serde(default)]
    tag: String,
    #[serde(default)]
    townhall_level: Option<u32>,
    #[serde(default)]
    times_attacked: u32,
    #[serde(default)]
    stars_allowed: u32,
    #[serde(default)]
    triples_allowed: u32,
    #[serde(default)]
    defense_quality: Option<f64>,
}

/// Previously written individual player file; only the town-hall field is
/// interesting here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerFileStub {
    #[serde(default)]
    town_hall: Option<u32>,
}

/// Backfills fields the war payloads lack: defensive stats from roster
/// exports, league tiers from tabular exports, and town-hall levels from a
/// prioritized chain of sources. Every source is optional; a missing or
/// malformed file is logged and skipped.
pub struct EnrichmentPipeline {
    data_dir: PathBuf,
}

impl EnrichmentPipeline {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn default_dir() -> PathBuf {
        std::env::var("CWL_STATS_DATA_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn enrich(&self, ledger: &mut PlayerLedger, clans: &mut [ClanCareerStats]) {
        self.backfill_defense(ledger);
        self.backfill_leagues(ledger, clans);
        self.backfill_town_halls(ledger);
    }

    fn backfill_defense(&self, ledger: &mut PlayerLedger) {
        let mut rosters: HashMap<(String, String), Option<HashMap<String, RosterEntry>>> =
            HashMap::new();
        for player in ledger.players_mut() {
            for season in &mut player.seasons {
                let key = (season.season.clone(), season.clan_tag.clone());
                let roster = rosters
                    .entry(key)
                    .or_insert_with(|| self.load_roster(&season.season, &season.clan_tag));
                let Some(roster) = roster else {
                    continue;
                };
                let Some(entry) = roster.get(&season.tag) else {
                    continue;
                };
                season.defense = Some(DefenseStats {
                    times_attacked: entry.times_attacked,
                    stars_allowed: entry.stars_allowed,
                    triples_allowed: entry.triples_allowed,
                    defense_quality: entry.defense_quality.unwrap_or(DEFAULT_DEFENSE_QUALITY),
                });
            }
        }
    }

    fn load_roster(&self, season: &str, clan_tag: &str) -> Option<HashMap<String, RosterEntry>> {
        let path = self
            .data_dir
            .join("rosters")
            .join(season)
            .join(format!("{}.json", tags::file_key(clan_tag)));
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(path = %path.display(), "no roster file");
                return None;
            }
        };
        match serde_json::from_str::<Vec<RosterEntry>>(&raw) {
            Ok(entries) => Some(
                entries
                    .into_iter()
                    .map(|entry| (tags::normalize_tag(&entry.tag), entry))
                    .collect(),
            ),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable roster file, skipping");
                None
            }
        }
    }

    fn backfill_leagues(&self, ledger: &mut PlayerLedger, clans: &mut [ClanCareerStats]) {
        let mut leagues: HashMap<(String, String), String> = HashMap::new();
        for clan in clans.iter() {
            let path = self
                .data_dir
                .join("leagues")
                .join(format!("{}.csv", tags::file_key(&clan.tag)));
            if let Some(rows) = read_league_csv(&path) {
                leagues.extend(rows);
            }
        }
        if leagues.is_empty() {
            return;
        }

        for player in ledger.players_mut() {
            for season in &mut player.seasons {
                let key = (season.clan_tag.clone(), season.season.clone());
                if let Some(league) = leagues.get(&key) {
                    season.league = Some(league.clone());
                }
            }
        }
        for clan in clans.iter_mut() {
            for summary in &mut clan.seasons {
                let key = (clan.tag.clone(), summary.season.clone());
                if let Some(league) = leagues.get(&key) {
                    summary.league = Some(league.clone());
                }
            }
        }
    }

    fn backfill_town_halls(&self, ledger: &mut PlayerLedger) {
        let war_stats = self.load_war_stats();
        for player in ledger.players_mut() {
            if player.town_hall.is_none() {
                player.town_hall = war_stats.get(&player.tag).copied();
            }
            if player.town_hall.is_none() {
                player.town_hall = self.town_hall_from_player_file(&player.tag);
            }
            if player.town_hall.is_none() {
                // Newest season first; the roster exports carry their own
                // town-hall snapshot.
                let mut seasons: Vec<(String, String)> = player
                    .seasons
                    .iter()
                    .map(|s| (s.season.clone(), s.clan_tag.clone()))
                    .collect();
                seasons.sort_by(|a, b| b.0.cmp(&a.0));
                for (season, clan_tag) in seasons {
                    let Some(roster) = self.load_roster(&season, &clan_tag) else {
                        continue;
                    };
                    if let Some(th) = roster.get(&player.tag).and_then(|e| e.townhall_level) {
                        player.town_hall = Some(th);
                        break;
                    }
                }
            }
        }
    }

    /// Player tag -> highest Average TH seen across all war-statistics exports.
    fn load_war_stats(&self) -> HashMap<String, u32> {
        let dir = self.data_dir.join("war_stats");
        let mut out: HashMap<String, u32> = HashMap::new();
        let Ok(entries) = fs::read_dir(&dir) else {
            debug!(dir = %dir.display(), "no war statistics exports");
            return out;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                continue;
            }
            for (tag, th) in read_war_stats_csv(&path) {
                let slot = out.entry(tag).or_insert(0);
                if th > *slot {
                    *slot = th;
                }
            }
        }
        out.retain(|_, th| *th > 0);
        out
    }

    fn town_hall_from_player_file(&self, player_tag: &str) -> Option<u32> {
        let path = self
            .data_dir
            .join("players")
            .join(format!("{}.json", tags::file_key(player_tag)));
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<PlayerFileStub>(&raw) {
            Ok(stub) => stub.town_hall,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable player file, skipping");
                None
            }
        }
    }
}

/// (clan tag, season) -> league name, from a `Tag,Season,League Name` export.
fn read_league_csv(path: &Path) -> Option<HashMap<(String, String), String>> {
    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(reader) => reader,
        Err(_) => {
            debug!(path = %path.display(), "no league export");
            return None;
        }
    };
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable league export, skipping");
            return None;
        }
    };
    let tag_idx = column_index(&headers, "Tag")?;
    let season_idx = column_index(&headers, "Season")?;
    let league_idx = column_index(&headers, "League Name")?;

    let mut out = HashMap::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %path.display(), %err, "bad league row, skipping");
                continue;
            }
        };
        let (Some(tag), Some(season), Some(league)) = (
            record.get(tag_idx),
            record.get(season_idx),
            record.get(league_idx),
        ) else {
            continue;
        };
        if tag.trim().is_empty() || season.trim().is_empty() || league.trim().is_empty() {
            continue;
        }
        out.insert(
            (tags::normalize_tag(tag), season.trim().to_string()),
            league.trim().to_string(),
        );
    }
    Some(out)
}

/// Player tag -> Average TH rows from a war-statistics export.
fn read_war_stats_csv(path: &Path) -> Vec<(String, u32)> {
    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(reader) => reader,
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable war statistics export, skipping");
            return Vec::new();
        }
    };
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(_) => return Vec::new(),
    };
    let (Some(tag_idx), Some(th_idx)) =
        (column_index(&headers, "Tag"), column_index(&headers, "Average TH"))
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for record in reader.records().flatten() {
        let (Some(tag), Some(th)) = (record.get(tag_idx), record.get(th_idx)) else {
            continue;
        };
        if tag.trim().is_empty() {
            continue;
        }
        let Ok(th) = th.trim().parse::<f64>() else {
            continue;
        };
        if th > 0.0 {
            out.push((tags::normalize_tag(tag), th.round() as u32));
        }
    }
    out
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}
