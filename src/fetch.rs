use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::model::{is_payload_complete, RawSeasonPayload, WarState};
use crate::tags;

const REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 500;
const DEFAULT_API_BASE: &str = "https://api.clashking.xyz";

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

fn api_base() -> String {
    std::env::var("CWL_STATS_API_BASE")
        .ok()
        .filter(|base| !base.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    pub offline: bool,
    pub refresh: bool,
    pub refresh_current: bool,
}

#[derive(Debug)]
pub enum SeasonData {
    Payload(RawSeasonPayload),
    NoData,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub data: SeasonData,
    /// True when any request went out, successful or not. The run loop uses
    /// this to apply the rate-limit pause; pure cache hits skip it.
    pub touched_network: bool,
}

/// Run-scoped fetch state. `last_observed_state` is the most recently seen
/// lifecycle state for the current season, across all clans; it only steers
/// endpoint selection within this run and is deliberately coarse.
pub struct FetchContext<'a> {
    cache: &'a CacheStore,
    opts: FetchOptions,
    current_season: String,
    pub last_observed_state: Option<WarState>,
}

/// Live endpoint is worth trying only for the current season, when the season
/// has not been observed as ended, and never during a forced refresh.
pub fn should_use_live(
    season: &str,
    current_season: &str,
    last_observed_state: Option<WarState>,
    refreshing: bool,
) -> bool {
    season == current_season && !refreshing && last_observed_state != Some(WarState::Ended)
}

impl<'a> FetchContext<'a> {
    pub fn new(cache: &'a CacheStore, opts: FetchOptions, current_season: String) -> Self {
        Self {
            cache,
            opts,
            current_season,
            last_observed_state: None,
        }
    }

    /// Produce the season payload for one clan: cache first, then live-group or
    /// historical endpoint per the selection rules. Network trouble degrades to
    /// NoData; only client construction and cache-write failures propagate.
    pub fn fetch_season(&mut self, clan_tag: &str, season: &str) -> Result<FetchOutcome> {
        let refreshing =
            self.opts.refresh || (self.opts.refresh_current && season == self.current_season);

        let mut cached = self.cache.load(clan_tag, season);
        let cached_complete = cached.as_ref().is_some_and(is_payload_complete);

        if self.opts.offline {
            return Ok(match cached {
                Some(payload) if cached_complete => {
                    self.observe(season, &payload);
                    FetchOutcome { data: SeasonData::Payload(payload), touched_network: false }
                }
                _ => FetchOutcome { data: SeasonData::NoData, touched_network: false },
            });
        }

        if !refreshing && cached_complete {
            if let Some(payload) = cached.take() {
                self.observe(season, &payload);
                return Ok(FetchOutcome {
                    data: SeasonData::Payload(payload),
                    touched_network: false,
                });
            }
        }

        // An incomplete cache entry still tells us the season's lifecycle state;
        // recover it before falling through to the network.
        if let Some(partial) = cached.as_ref() {
            self.observe(season, partial);
        }

        let key = tags::file_key(clan_tag);
        let base = api_base();

        if should_use_live(season, &self.current_season, self.last_observed_state, refreshing) {
            let url = format!("{base}/cwl/%23{key}/group");
            if let Some(body) = get_with_retry(&url)? {
                match extract_live_payload(&body) {
                    Some((payload, raw)) if is_payload_complete(&payload) => {
                        self.cache.save(clan_tag, season, &raw)?;
                        self.observe(season, &payload);
                        return Ok(FetchOutcome {
                            data: SeasonData::Payload(payload),
                            touched_network: true,
                        });
                    }
                    Some((payload, _)) => {
                        // Live data exists but is itself incomplete; note its
                        // state and fall through to the historical endpoint.
                        self.observe(season, &payload);
                        debug!(clan = clan_tag, season, "live payload incomplete, trying historical");
                    }
                    None => {
                        warn!(clan = clan_tag, season, "unparseable live payload, trying historical");
                    }
                }
            }
        }

        let url = format!("{base}/cwl/%23{key}/{season}");
        let Some(body) = get_with_retry(&url)? else {
            return Ok(FetchOutcome { data: SeasonData::NoData, touched_network: true });
        };
        let payload = match serde_json::from_str::<RawSeasonPayload>(&body) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(clan = clan_tag, season, %err, "unparseable season payload");
                return Ok(FetchOutcome { data: SeasonData::NoData, touched_network: true });
            }
        };
        self.cache.save(clan_tag, season, &body)?;
        self.observe(season, &payload);
        Ok(FetchOutcome {
            data: SeasonData::Payload(payload),
            touched_network: true,
        })
    }

    /// Record the current season's lifecycle state. Historical seasons are
    /// nearly always ended, and letting them write the flag would suppress the
    /// live endpoint before the current season is ever read.
    fn observe(&mut self, season: &str, payload: &RawSeasonPayload) {
        if season == self.current_season {
            self.last_observed_state = Some(WarState::parse(payload.state.as_deref()));
        }
    }
}

/// The live-group endpoint nests the season payload under `data`.
fn extract_live_payload(body: &str) -> Option<(RawSeasonPayload, String)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let inner = value.get("data")?;
    let raw = inner.to_string();
    let payload = serde_json::from_str::<RawSeasonPayload>(&raw).ok()?;
    Some((payload, raw))
}

/// GET with bounded retries and linear-ramp backoff. Not-found short-circuits
/// to None (a legitimate absence of data); everything else retries and, after
/// the last attempt, degrades to None with a warning.
fn get_with_retry(url: &str) -> Result<Option<String>> {
    let client = http_client()?;
    for attempt in 1..=MAX_ATTEMPTS {
        match client.get(url).send() {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::NOT_FOUND {
                    debug!(url, "upstream has no data");
                    return Ok(None);
                }
                if status.is_success() {
                    match resp.text() {
                        Ok(body) => return Ok(Some(body)),
                        Err(err) => warn!(url, attempt, %err, "failed reading body"),
                    }
                } else {
                    warn!(url, attempt, %status, "non-success response");
                }
            }
            Err(err) => warn!(url, attempt, %err, "request failed"),
        }
        if attempt < MAX_ATTEMPTS {
            std::thread::sleep(Duration::from_millis(RETRY_BASE_MS * attempt as u64));
        }
    }
    warn!(url, "retries exhausted, treating season as missing");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE_ENDED: &str = r##"{"state": "ended", "rounds": [{"wars": [{"state": "warEnded", "self": {"tag": "#A"}, "other": {"tag": "#B"}}]}]}"##;
    const INCOMPLETE_ENDED: &str = r##"{"state": "ended", "rounds": [{"wars": ["#ABC"]}]}"##;

    fn temp_cache(name: &str) -> CacheStore {
        let dir = std::env::temp_dir()
            .join("cwl_stats_fetch_test")
            .join(format!("{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        CacheStore::new(dir)
    }

    fn offline_opts() -> FetchOptions {
        FetchOptions { offline: true, ..FetchOptions::default() }
    }

    #[test]
    fn live_only_for_current_unended_unrefreshed() {
        assert!(should_use_live("2024-05", "2024-05", None, false));
        assert!(should_use_live("2024-05", "2024-05", Some(WarState::InWar), false));
    }

    #[test]
    fn ended_current_season_goes_straight_to_historical() {
        assert!(!should_use_live("2024-05", "2024-05", Some(WarState::Ended), false));
    }

    #[test]
    fn historical_seasons_never_use_live() {
        assert!(!should_use_live("2023-11", "2024-05", None, false));
    }

    #[test]
    fn forced_refresh_skips_live() {
        assert!(!should_use_live("2024-05", "2024-05", Some(WarState::InWar), true));
    }

    #[test]
    fn offline_complete_cache_hits_without_network() {
        let cache = temp_cache("offline_hit");
        cache.save("#AAA", "2025-07", COMPLETE_ENDED).expect("save should succeed");
        let mut ctx = FetchContext::new(&cache, offline_opts(), "2025-08".to_string());
        let outcome = ctx.fetch_season("#AAA", "2025-07").expect("fetch should succeed");
        assert!(matches!(outcome.data, SeasonData::Payload(_)));
        assert!(!outcome.touched_network);
    }

    #[test]
    fn offline_incomplete_cache_is_no_data() {
        let cache = temp_cache("offline_incomplete");
        cache.save("#AAA", "2025-07", INCOMPLETE_ENDED).expect("save should succeed");
        let mut ctx = FetchContext::new(&cache, offline_opts(), "2025-08".to_string());
        let outcome = ctx.fetch_season("#AAA", "2025-07").expect("fetch should succeed");
        assert!(matches!(outcome.data, SeasonData::NoData));
        assert!(!outcome.touched_network);
    }

    #[test]
    fn offline_missing_cache_is_no_data() {
        let cache = temp_cache("offline_missing");
        let mut ctx = FetchContext::new(&cache, offline_opts(), "2025-08".to_string());
        let outcome = ctx.fetch_season("#AAA", "2025-06").expect("fetch should succeed");
        assert!(matches!(outcome.data, SeasonData::NoData));
    }

    #[test]
    fn historical_season_state_does_not_suppress_live() {
        // Seasons are processed oldest first, so a previous month's ended
        // payload must not decide the current month's endpoint.
        let cache = temp_cache("historical_state");
        cache.save("#AAA", "2025-07", COMPLETE_ENDED).expect("save should succeed");
        let mut ctx = FetchContext::new(&cache, offline_opts(), "2025-08".to_string());
        ctx.fetch_season("#AAA", "2025-07").expect("fetch should succeed");
        assert_eq!(ctx.last_observed_state, None);
        assert!(should_use_live("2025-08", "2025-08", ctx.last_observed_state, false));
    }

    #[test]
    fn current_season_ended_state_disables_live() {
        let cache = temp_cache("current_state");
        cache.save("#AAA", "2025-08", COMPLETE_ENDED).expect("save should succeed");
        let mut ctx = FetchContext::new(&cache, offline_opts(), "2025-08".to_string());
        ctx.fetch_season("#AAA", "2025-08").expect("fetch should succeed");
        assert_eq!(ctx.last_observed_state, Some(WarState::Ended));
        assert!(!should_use_live("2025-08", "2025-08", ctx.last_observed_state, false));
    }

    #[test]
    fn observe_ignores_historical_seasons() {
        let cache = temp_cache("observe_guard");
        let mut ctx = FetchContext::new(&cache, FetchOptions::default(), "2025-08".to_string());
        let payload: RawSeasonPayload =
            serde_json::from_str(INCOMPLETE_ENDED).expect("payload should parse");
        ctx.observe("2025-07", &payload);
        assert_eq!(ctx.last_observed_state, None);
        ctx.observe("2025-08", &payload);
        assert_eq!(ctx.last_observed_state, Some(WarState::Ended));
    }

    #[test]
    fn live_envelope_unwraps_data() {
        let body = r##"{"data": {"state": "inWar", "rounds": [{"wars": [{"self": {"tag": "#A"}}]}]}}"##;
        let (payload, raw) = extract_live_payload(body).expect("envelope should unwrap");
        assert!(is_payload_complete(&payload));
        assert!(raw.contains("rounds"));
        assert!(extract_live_payload(r##"{"nope": 1}"##).is_none());
    }
}
