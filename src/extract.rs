use crate::model::{RawSeasonPayload, WarEntry, WarRecord, WarState};

/// The two views of a season the accumulators care about. `all` drives roster
/// and total-war counting; `with_attacks` drives scoring. Preparation-phase
/// wars have no attack data yet; wars with unknown or missing state are kept
/// in both lists (only explicit preparation is excluded).
#[derive(Debug, Default)]
pub struct ExtractedWars {
    pub all: Vec<WarRecord>,
    pub with_attacks: Vec<WarRecord>,
}

/// Flatten a raw season payload into usable war records, dropping bare-tag
/// entries, placeholder bye slots, and entries that lost both sides.
pub fn extract_wars(payload: &RawSeasonPayload) -> ExtractedWars {
    let mut out = ExtractedWars::default();

    let round_entries = payload.rounds.iter().flat_map(|round| round.wars.iter());
    for entry in round_entries.chain(payload.wars.iter()) {
        let WarEntry::War(war) = entry else {
            continue;
        };
        if !is_usable(war) {
            continue;
        }
        out.all.push((**war).clone());
        if war.state() != WarState::Preparation {
            out.with_attacks.push((**war).clone());
        }
    }

    out
}

fn is_usable(war: &WarRecord) -> bool {
    if war.own.is_none() && war.other.is_none() {
        return false;
    }
    let placeholder = war
        .own
        .as_ref()
        .map(|side| side.is_placeholder())
        .unwrap_or(false)
        || war
            .other
            .as_ref()
            .map(|side| side.is_placeholder())
            .unwrap_or(false);
    !placeholder
}
