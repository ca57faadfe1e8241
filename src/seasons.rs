use chrono::{Datelike, NaiveDate};

/// Ordered list of `YYYY-MM` season identifiers from January of `start_year`
/// through the month of `today`, inclusive.
pub fn enumerate_seasons(start_year: i32, today: NaiveDate) -> Vec<String> {
    let mut out = Vec::new();
    for year in start_year..=today.year() {
        let last_month = if year == today.year() { today.month() } else { 12 };
        for month in 1..=last_month {
            out.push(format!("{year}-{month:02}"));
        }
    }
    out
}

pub fn current_season(today: NaiveDate) -> String {
    format!("{}-{:02}", today.year(), today.month())
}

/// Drop seasons before `start`. An unknown `start` keeps the full list; callers
/// asked for a window we cannot resolve, and processing everything is the safer
/// answer than processing nothing.
pub fn truncate_from(seasons: Vec<String>, start: Option<&str>) -> Vec<String> {
    let Some(start) = start else {
        return seasons;
    };
    match seasons.iter().position(|s| s == start) {
        Some(idx) => seasons[idx..].to_vec(),
        None => {
            tracing::debug!(start, "start season not in enumerated list, keeping all");
            seasons
        }
    }
}
