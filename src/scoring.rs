use crate::accumulate::{PlayerCareerRecord, PlayerSeasonStats};

pub const WEIGHT_PERFORMANCE: f64 = 0.45;
pub const WEIGHT_ATTENDANCE: f64 = 0.35;
pub const WEIGHT_LEAGUE: f64 = 0.20;

/// Unranked or unrecognized league tiers score the midpoint. This default
/// shifts the weighted score, so it lives here by name, not inline.
pub const DEFAULT_LEAGUE_SCORE: f64 = 50.0;
/// No recorded defenses counts as perfect defense. Deliberate convention
/// shared with the enrichment pipeline.
pub const DEFAULT_DEFENSE_QUALITY: f64 = 100.0;

/// Seasons-averaged star delta below which a career is "stable".
const TREND_THRESHOLD: f64 = 0.15;

/// League difficulty, 15-100 across the named tiers.
const LEAGUE_SCORES: &[(&str, f64)] = &[
    ("champion league i", 100.0),
    ("champion league ii", 95.0),
    ("champion league iii", 90.0),
    ("master league i", 84.0),
    ("master league ii", 76.0),
    ("master league iii", 68.0),
    ("crystal league i", 60.0),
    ("crystal league ii", 55.0),
    ("crystal league iii", 50.0),
    ("gold league i", 45.0),
    ("gold league ii", 40.0),
    ("gold league iii", 36.0),
    ("silver league i", 32.0),
    ("silver league ii", 28.0),
    ("silver league iii", 24.0),
    ("bronze league i", 20.0),
    ("bronze league ii", 17.0),
    ("bronze league iii", 15.0),
];

pub fn league_score(league: Option<&str>) -> f64 {
    let Some(league) = league else {
        return DEFAULT_LEAGUE_SCORE;
    };
    let needle = league.trim().to_lowercase();
    LEAGUE_SCORES
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_LEAGUE_SCORE)
}

#[derive(Debug, Clone, Copy)]
pub struct ReliabilityBreakdown {
    pub performance: f64,
    pub attendance: f64,
    pub league_adjustment: f64,
    pub weighted: f64,
}

/// The composite score from already-normalized inputs. Kept separate from the
/// career roll-up so the arithmetic is testable against known figures.
pub fn reliability(
    avg_stars: f64,
    three_star_rate: f64,
    attacks: u32,
    wars: u32,
    league_adjustment: f64,
) -> ReliabilityBreakdown {
    let performance = ((avg_stars / 3.0) * 50.0 + (three_star_rate / 100.0) * 50.0).min(100.0);
    let attendance = if wars == 0 {
        0.0
    } else {
        (f64::from(attacks) / f64::from(wars) * 100.0).min(100.0)
    };
    let weighted = performance * WEIGHT_PERFORMANCE
        + attendance * WEIGHT_ATTENDANCE
        + league_adjustment * WEIGHT_LEAGUE;
    ReliabilityBreakdown {
        performance,
        attendance,
        league_adjustment,
        weighted,
    }
}

/// Attack-count-weighted average of each season's league difficulty.
pub fn league_adjustment(seasons: &[PlayerSeasonStats]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight = 0u32;
    for season in seasons {
        if season.attacks == 0 {
            continue;
        }
        weighted_sum += league_score(season.league.as_deref()) * f64::from(season.attacks);
        weight += season.attacks;
    }
    if weight == 0 {
        DEFAULT_LEAGUE_SCORE
    } else {
        weighted_sum / f64::from(weight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        }
    }
}

fn season_avg_stars(season: &PlayerSeasonStats) -> f64 {
    if season.attacks == 0 {
        0.0
    } else {
        f64::from(season.stars) / f64::from(season.attacks)
    }
}

/// Recent-form classification. With four or more seasons, compare the mean of
/// the last three against everything earlier; with two or three, last against
/// first. Undefined below two seasons.
pub fn performance_trend(seasons: &[PlayerSeasonStats]) -> Option<Trend> {
    if seasons.len() < 2 {
        return None;
    }
    let delta = if seasons.len() >= 4 {
        let split = seasons.len() - 3;
        let recent: f64 =
            seasons[split..].iter().map(season_avg_stars).sum::<f64>() / 3.0;
        let earlier: f64 = seasons[..split].iter().map(season_avg_stars).sum::<f64>()
            / split as f64;
        recent - earlier
    } else {
        season_avg_stars(&seasons[seasons.len() - 1]) - season_avg_stars(&seasons[0])
    };
    Some(if delta > TREND_THRESHOLD {
        Trend::Improving
    } else if delta < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    })
}

#[derive(Debug, Clone)]
pub struct BestSeason {
    pub season: String,
    pub stars: u32,
    pub avg_stars: f64,
}

/// Highest star total; average stars breaks ties.
pub fn best_season(seasons: &[PlayerSeasonStats]) -> Option<BestSeason> {
    let mut best: Option<&PlayerSeasonStats> = None;
    for season in seasons {
        let better = match best {
            None => true,
            Some(current) => {
                season.stars > current.stars
                    || (season.stars == current.stars
                        && season_avg_stars(season) > season_avg_stars(current))
            }
        };
        if better {
            best = Some(season);
        }
    }
    best.map(|season| BestSeason {
        season: season.season.clone(),
        stars: season.stars,
        avg_stars: season_avg_stars(season),
    })
}

#[derive(Debug, Clone)]
pub struct LeagueStint {
    pub league: String,
    pub seasons: u32,
    pub attacks: u32,
}

/// Seasons grouped by league tier, sorted by attacks descending. The top
/// entry is the player's primary league.
pub fn league_history(seasons: &[PlayerSeasonStats]) -> Vec<LeagueStint> {
    let mut stints: Vec<LeagueStint> = Vec::new();
    for season in seasons {
        let Some(league) = season.league.as_deref() else {
            continue;
        };
        match stints.iter_mut().find(|s| s.league == league) {
            Some(stint) => {
                stint.seasons += 1;
                stint.attacks += season.attacks;
            }
            None => stints.push(LeagueStint {
                league: league.to_string(),
                seasons: 1,
                attacks: season.attacks,
            }),
        }
    }
    stints.sort_by(|a, b| b.attacks.cmp(&a.attacks));
    stints
}

#[derive(Debug, Clone)]
pub struct PlayerScorecard {
    pub tag: String,
    pub name: String,
    pub clan_tag: String,
    pub town_hall: Option<u32>,
    pub seasons_played: u32,
    pub wars: u32,
    pub attacks: u32,
    pub stars: u32,
    pub destruction: f64,
    pub triples: u32,
    pub avg_stars: f64,
    pub avg_destruction: f64,
    pub three_star_rate: f64,
    pub reliability: ReliabilityBreakdown,
    /// `wars - attacks`; negative under malformed input, surfaced as-is.
    pub missed_attacks: i64,
    pub times_attacked: u32,
    pub stars_allowed: u32,
    pub triples_allowed: u32,
    pub defense_quality: f64,
    pub best_season: Option<BestSeason>,
    pub trend: Option<Trend>,
    pub league_history: Vec<LeagueStint>,
    pub primary_league: Option<String>,
}

/// Pure roll-up of one player's accumulated and enriched career.
pub fn score_player(record: &PlayerCareerRecord) -> PlayerScorecard {
    let mut wars = 0u32;
    let mut attacks = 0u32;
    let mut stars = 0u32;
    let mut destruction = 0.0f64;
    let mut triples = 0u32;
    let mut times_attacked = 0u32;
    let mut stars_allowed = 0u32;
    let mut triples_allowed = 0u32;
    for season in &record.seasons {
        wars += season.wars_participated;
        attacks += season.attacks;
        stars += season.stars;
        destruction += season.destruction;
        triples += season.triples;
        if let Some(defense) = &season.defense {
            times_attacked += defense.times_attacked;
            stars_allowed += defense.stars_allowed;
            triples_allowed += defense.triples_allowed;
        }
    }

    let avg_stars = if attacks == 0 { 0.0 } else { f64::from(stars) / f64::from(attacks) };
    let avg_destruction =
        if attacks == 0 { 0.0 } else { destruction / f64::from(attacks) };
    let three_star_rate =
        if attacks == 0 { 0.0 } else { f64::from(triples) / f64::from(attacks) * 100.0 };

    let adjustment = league_adjustment(&record.seasons);
    let reliability = reliability(avg_stars, three_star_rate, attacks, wars, adjustment);

    let defense_quality = if times_attacked == 0 {
        DEFAULT_DEFENSE_QUALITY
    } else {
        let avg_allowed = f64::from(stars_allowed) / f64::from(times_attacked);
        (100.0 - (avg_allowed / 3.0) * 100.0).max(0.0)
    };

    let history = league_history(&record.seasons);
    let primary_league = history.first().map(|stint| stint.league.clone());

    PlayerScorecard {
        tag: record.tag.clone(),
        name: record.name.clone(),
        clan_tag: record.clan_tag.clone(),
        town_hall: record.town_hall,
        seasons_played: record.seasons.len() as u32,
        wars,
        attacks,
        stars,
        destruction,
        triples,
        avg_stars,
        avg_destruction,
        three_star_rate,
        reliability,
        missed_attacks: i64::from(wars) - i64::from(attacks),
        times_attacked,
        stars_allowed,
        triples_allowed,
        defense_quality,
        best_season: best_season(&record.seasons),
        trend: performance_trend(&record.seasons),
        league_history: history,
        primary_league,
    }
}
