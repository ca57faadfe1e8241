use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::model::RawSeasonPayload;
use crate::tags;

const CACHE_DIR: &str = "cwl_stats";

/// Raw season payloads on disk, one file per (clan key, season), holding the
/// body exactly as the upstream returned it. Writes are whole-file tmp+rename
/// swaps, so an interrupted run never leaves a half-written entry. No locking:
/// the tool is single-process by design, and concurrent invocations racing on
/// these files is a documented limitation.
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Resolve the default cache directory: `$CWL_STATS_CACHE_DIR`, then XDG
    /// cache, then `~/.cache`.
    pub fn default_dir() -> Option<PathBuf> {
        if let Ok(base) = std::env::var("CWL_STATS_CACHE_DIR") {
            if !base.trim().is_empty() {
                return Some(PathBuf::from(base));
            }
        }
        if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
            if !base.trim().is_empty() {
                return Some(PathBuf::from(base).join(CACHE_DIR));
            }
        }
        let home = std::env::var("HOME").ok()?;
        if home.trim().is_empty() {
            return None;
        }
        Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
    }

    fn entry_path(&self, clan_tag: &str, season: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{season}.json", tags::file_key(clan_tag)))
    }

    /// Parsed payload for (clan, season), or None on absence or corruption.
    /// Corrupt files are logged and treated as misses; the fetch layer will
    /// overwrite them wholesale.
    pub fn load(&self, clan_tag: &str, season: &str) -> Option<RawSeasonPayload> {
        let path = self.entry_path(clan_tag, season);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<RawSeasonPayload>(&raw) {
            Ok(payload) => Some(payload),
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable cache entry, treating as miss");
                None
            }
        }
    }

    /// Persist the raw body for (clan, season), replacing prior contents.
    pub fn save(&self, clan_tag: &str, season: &str, body: &str) -> Result<()> {
        let path = self.entry_path(clan_tag, season);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create cache dir")?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).context("write cache entry")?;
        fs::rename(&tmp, &path).context("swap cache entry")?;
        debug!(path = %path.display(), "cached season payload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::is_payload_complete;

    fn temp_store(name: &str) -> CacheStore {
        let dir = std::env::temp_dir()
            .join("cwl_stats_test")
            .join(format!("{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        CacheStore::new(dir)
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = temp_store("round_trip");
        let body = r##"{"state": "ended", "rounds": [{"wars": [{"state": "warEnded", "self": {"tag": "#A"}, "other": {"tag": "#B"}}]}]}"##;
        store.save("#abc", "2024-03", body).expect("save should succeed");
        let payload = store.load("#ABC", "2024-03").expect("entry should load");
        assert!(is_payload_complete(&payload));
    }

    #[test]
    fn missing_entry_is_none() {
        let store = temp_store("missing");
        assert!(store.load("#ABC", "2024-01").is_none());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let store = temp_store("corrupt");
        store.save("#abc", "2024-02", "not json at all").expect("save should succeed");
        assert!(store.load("#abc", "2024-02").is_none());
    }
}
