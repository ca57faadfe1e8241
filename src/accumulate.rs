use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::warn;

use crate::extract::ExtractedWars;
use crate::model::{WarRecord, WarResult, WarState};
use crate::tags;

#[derive(Debug, Clone, Default)]
pub struct DefenseStats {
    pub times_attacked: u32,
    pub stars_allowed: u32,
    pub triples_allowed: u32,
    /// The roster export's own per-season figure, carried as-is. The career
    /// defense quality is recomputed from the raw counts at scoring time.
    pub defense_quality: f64,
}

/// One player's aggregated activity for one clan in one season.
#[derive(Debug, Clone)]
pub struct PlayerSeasonStats {
    pub tag: String,
    pub name: String,
    pub clan_tag: String,
    pub season: String,
    pub attacks: u32,
    pub stars: u32,
    pub destruction: f64,
    pub triples: u32,
    /// Attack counts by stars earned; `sum(star_histogram) == attacks` holds
    /// by construction.
    pub star_histogram: [u32; 4],
    /// Distinct wars the player was rostered in, keyed by war start timestamp.
    pub wars_participated: u32,
    pub town_hall: Option<u32>,
    pub defense: Option<DefenseStats>,
    pub league: Option<String>,
}

/// Aggregate a single player's attacks across a season's attack-bearing wars.
/// Returns zero-valued stats if the player is rostered but never attacked;
/// callers decide whether zero-attack players are recorded.
pub fn accumulate_player(
    wars_with_attacks: &[WarRecord],
    player_tag: &str,
    clan_tag: &str,
    season: &str,
) -> PlayerSeasonStats {
    let player_tag = tags::normalize_tag(player_tag);
    let mut stats = PlayerSeasonStats {
        tag: player_tag.clone(),
        name: String::new(),
        clan_tag: tags::normalize_tag(clan_tag),
        season: season.to_string(),
        attacks: 0,
        stars: 0,
        destruction: 0.0,
        triples: 0,
        star_histogram: [0; 4],
        wars_participated: 0,
        town_hall: None,
        defense: None,
        league: None,
    };

    let mut participated: HashSet<String> = HashSet::new();
    for (idx, war) in wars_with_attacks.iter().enumerate() {
        let Some(side) = war.side_for(clan_tag) else {
            continue;
        };
        let Some(member) = side
            .members
            .iter()
            .find(|m| tags::tags_equal(&m.tag, &player_tag))
        else {
            continue;
        };

        participated.insert(war_key(war, idx));
        if !member.name.is_empty() {
            stats.name = member.name.clone();
        }
        if member.townhall_level.is_some() {
            stats.town_hall = member.townhall_level;
        }
        for attack in &member.attacks {
            stats.attacks += 1;
            stats.stars += attack.stars;
            stats.destruction += attack.destruction_percentage;
            let bucket = attack.stars.min(3) as usize;
            stats.star_histogram[bucket] += 1;
            if attack.stars >= 3 {
                stats.triples += 1;
            }
        }
    }
    stats.wars_participated = participated.len() as u32;

    // One attack per war in this league format; more attacks than rostered
    // wars means the upstream handed us duplicated or malformed records.
    if stats.attacks > stats.wars_participated {
        warn!(
            player = %stats.tag,
            season,
            attacks = stats.attacks,
            wars = stats.wars_participated,
            "attack count exceeds rostered wars"
        );
    }
    stats
}

/// Season stats for every player who attacked at least once for the clan.
/// Rostered players with zero attacks are skipped here; their absence is what
/// the attendance sub-score measures.
pub fn accumulate_clan_players(
    wars_with_attacks: &[WarRecord],
    clan_tag: &str,
    season: &str,
) -> Vec<PlayerSeasonStats> {
    let mut roster: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for war in wars_with_attacks {
        let Some(side) = war.side_for(clan_tag) else {
            continue;
        };
        for member in &side.members {
            let tag = tags::normalize_tag(&member.tag);
            if seen.insert(tag.clone()) {
                roster.push(tag);
            }
        }
    }

    roster
        .iter()
        .map(|tag| accumulate_player(wars_with_attacks, tag, clan_tag, season))
        .filter(|stats| stats.attacks > 0)
        .collect()
}

fn war_key(war: &WarRecord, idx: usize) -> String {
    war.start_time
        .clone()
        .or_else(|| war.end_time.clone())
        .unwrap_or_else(|| format!("war-{idx}"))
}

#[derive(Debug, Clone, Default)]
pub struct ClanSeasonSummary {
    pub season: String,
    pub wars: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub stars: u32,
    pub destruction: f64,
    pub league: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClanCareerStats {
    pub tag: String,
    pub name: String,
    /// Ended wars only, stars-only comparison.
    pub wars_won: u32,
    pub wars_lost: u32,
    pub wars_tied: u32,
    /// Every extracted war, including in-progress ones.
    pub total_wars: u32,
    pub stars: u32,
    pub destruction: f64,
    pub attacks: u32,
    pub members: BTreeSet<String>,
    pub seasons: Vec<ClanSeasonSummary>,
}

impl ClanCareerStats {
    pub fn new(name: &str, tag: &str) -> Self {
        Self {
            tag: tags::normalize_tag(tag),
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Fold one season's extracted wars into the career record.
    pub fn record_season(&mut self, season: &str, extracted: &ExtractedWars) {
        self.total_wars += extracted.all.len() as u32;

        let mut summary = ClanSeasonSummary {
            season: season.to_string(),
            ..ClanSeasonSummary::default()
        };

        for war in &extracted.all {
            if let Some(side) = war.side_for(&self.tag) {
                for member in &side.members {
                    self.members.insert(tags::normalize_tag(&member.tag));
                }
            }
        }

        for war in &extracted.with_attacks {
            let Some((ours, theirs)) = war.sides_for(&self.tag) else {
                continue;
            };
            summary.wars += 1;
            summary.stars += ours.stars;
            summary.destruction += ours.destruction_percentage;
            self.stars += ours.stars;
            self.destruction += ours.destruction_percentage;
            self.attacks += ours.attacks;

            if war.state() != WarState::Ended {
                continue;
            }
            // Career tally: stars only, no destruction tiebreak.
            if ours.stars > theirs.stars {
                self.wars_won += 1;
            } else if ours.stars < theirs.stars {
                self.wars_lost += 1;
            } else {
                self.wars_tied += 1;
            }
            // Season summary: per-war classifier with destruction tiebreak.
            match war.result_for(&self.tag) {
                Some(WarResult::Win) => summary.wins += 1,
                Some(WarResult::Loss) => summary.losses += 1,
                Some(WarResult::Tie) => summary.ties += 1,
                None => {}
            }
        }

        if summary.wars > 0 {
            self.seasons.push(summary);
        }
    }
}

/// One player's accumulation across all processed seasons. The current clan is
/// whichever clan the most recently processed season saw them in.
#[derive(Debug, Clone)]
pub struct PlayerCareerRecord {
    pub tag: String,
    pub name: String,
    pub clan_tag: String,
    pub town_hall: Option<u32>,
    pub seasons: Vec<PlayerSeasonStats>,
}

/// Tag-keyed repository for career accumulation. Seasons are merged in
/// processing order, so "latest wins" fields fall out of insertion order.
#[derive(Debug, Default)]
pub struct PlayerLedger {
    players: BTreeMap<String, PlayerCareerRecord>,
}

impl PlayerLedger {
    pub fn merge_season(&mut self, stats: PlayerSeasonStats) {
        let record = self
            .players
            .entry(stats.tag.clone())
            .or_insert_with(|| PlayerCareerRecord {
                tag: stats.tag.clone(),
                name: stats.name.clone(),
                clan_tag: stats.clan_tag.clone(),
                town_hall: None,
                seasons: Vec::new(),
            });
        if !stats.name.is_empty() {
            record.name = stats.name.clone();
        }
        record.clan_tag = stats.clan_tag.clone();
        if stats.town_hall.is_some() {
            record.town_hall = stats.town_hall;
        }
        record.seasons.push(stats);
    }

    pub fn get(&self, tag: &str) -> Option<&PlayerCareerRecord> {
        self.players.get(&tags::normalize_tag(tag))
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerCareerRecord> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut PlayerCareerRecord> {
        self.players.values_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
