use serde::Deserialize;

use crate::tags;

/// One clan's raw payload for one season, as returned by either upstream
/// endpoint. Wars may be listed directly or nested in rounds, and round entries
/// may be bare war tags instead of full records -- that is a first-class
/// condition (an incomplete payload), not a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSeasonPayload {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub wars: Vec<WarEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Round {
    #[serde(default)]
    pub wars: Vec<WarEntry>,
}

/// Round entries are either bare war-tag strings (the upstream's way of saying
/// "war exists but details live elsewhere") or full war records. Callers must
/// match; there is no implicit coercion.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WarEntry {
    War(Box<WarRecord>),
    Tag(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarRecord {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, rename = "self")]
    pub own: Option<WarSide>,
    #[serde(default)]
    pub other: Option<WarSide>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarSide {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub destruction_percentage: f64,
    #[serde(default)]
    pub attacks: u32,
    #[serde(default)]
    pub members: Vec<WarMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarMember {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub townhall_level: Option<u32>,
    #[serde(default)]
    pub attacks: Vec<Attack>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    #[serde(default)]
    pub attacker_tag: String,
    #[serde(default)]
    pub defender_tag: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub destruction_percentage: f64,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarState {
    Preparation,
    InWar,
    Ended,
    Unknown,
}

impl WarState {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("preparation") => WarState::Preparation,
            Some("inwar") | Some("in_war") | Some("war") => WarState::InWar,
            Some("warended") | Some("ended") => WarState::Ended,
            _ => WarState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarResult {
    Win,
    Loss,
    Tie,
}

impl WarRecord {
    pub fn state(&self) -> WarState {
        WarState::parse(self.state.as_deref())
    }

    /// The side the given clan appears on, regardless of whether the opposing
    /// side survived in the payload. Player accumulation only needs this.
    pub fn side_for(&self, clan_tag: &str) -> Option<&WarSide> {
        [self.own.as_ref(), self.other.as_ref()]
            .into_iter()
            .flatten()
            .find(|side| tags::tags_equal(&side.tag, clan_tag))
    }

    /// (our side, their side) for the given clan tag; None unless both sides
    /// are present. Team records need the opponent to compare against.
    pub fn sides_for(&self, clan_tag: &str) -> Option<(&WarSide, &WarSide)> {
        let own = self.own.as_ref();
        let other = self.other.as_ref();
        if own.is_some_and(|side| tags::tags_equal(&side.tag, clan_tag)) {
            return Some((own?, other?));
        }
        if other.is_some_and(|side| tags::tags_equal(&side.tag, clan_tag)) {
            return Some((other?, own?));
        }
        None
    }

    /// Per-war result for one clan: stars first, destruction as the tiebreaker.
    /// The aggregate career tally deliberately does NOT use this (it compares
    /// stars only); this classifier feeds the per-season summaries.
    pub fn result_for(&self, clan_tag: &str) -> Option<WarResult> {
        let (ours, theirs) = self.sides_for(clan_tag)?;
        if ours.stars != theirs.stars {
            return Some(if ours.stars > theirs.stars {
                WarResult::Win
            } else {
                WarResult::Loss
            });
        }
        if (ours.destruction_percentage - theirs.destruction_percentage).abs() > f64::EPSILON {
            return Some(if ours.destruction_percentage > theirs.destruction_percentage {
                WarResult::Win
            } else {
                WarResult::Loss
            });
        }
        Some(WarResult::Tie)
    }
}

impl WarSide {
    /// Bye slots show up as a sentinel `#0` tag or an empty tag.
    pub fn is_placeholder(&self) -> bool {
        let trimmed = self.tag.trim();
        trimmed.is_empty() || trimmed == "#0"
    }
}

/// A payload is complete iff at least one round's entries are structured war
/// records carrying a `self` side. Bare war tags mean the upstream handed us
/// identifiers only, which is unusable for accumulation.
pub fn is_payload_complete(payload: &RawSeasonPayload) -> bool {
    payload.rounds.iter().any(|round| {
        matches!(round.wars.first(), Some(WarEntry::War(war)) if war.own.is_some())
    })
}
