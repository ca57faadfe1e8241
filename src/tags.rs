/// Canonical tag form: trimmed, uppercased, with the `#` sigil prefixed.
/// Upstream payloads, cache files and enrichment exports disagree on casing and
/// whether the sigil is present; every comparison in this crate goes through here.
pub fn normalize_tag(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('#').unwrap_or(trimmed);
    format!("#{}", stripped.to_uppercase())
}

/// Tag without the sigil, for use in file names and URLs.
pub fn file_key(raw: &str) -> String {
    normalize_tag(raw).trim_start_matches('#').to_string()
}

pub fn tags_equal(a: &str, b: &str) -> bool {
    normalize_tag(a) == normalize_tag(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_sigil_and_uppercases() {
        assert_eq!(normalize_tag("2pp0qrjjg"), "#2PP0QRJJG");
        assert_eq!(normalize_tag("  #2pp0qrjjg "), "#2PP0QRJJG");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["abc", "#abc", "#ABC", " #aBc ", "", "#"] {
            let once = normalize_tag(raw);
            assert_eq!(normalize_tag(&once), once);
        }
    }

    #[test]
    fn file_key_strips_sigil() {
        assert_eq!(file_key("#2pp0qrjjg"), "2PP0QRJJG");
        assert_eq!(file_key("2PP0QRJJG"), "2PP0QRJJG");
    }

    #[test]
    fn equality_ignores_sigil_and_case() {
        assert!(tags_equal("#abc123", "ABC123"));
        assert!(!tags_equal("#abc123", "#abc124"));
    }
}
