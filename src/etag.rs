//! Content-derived validators and conditional-request freshness.

use sha2::{Digest, Sha256};

/// Strong ETag over the response body.
///
/// Identical content always yields the identical validator.
pub fn content_etag(content: &[u8]) -> String {
    versioned_etag(content, None)
}

/// Strong ETag over the response body plus an optional version marker.
///
/// The marker is the owning project's version for resources that had a
/// version placeholder substituted, so a version bump changes the
/// validator even when the source bytes did not change.
pub fn versioned_etag(content: &[u8], version: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    if let Some(version) = version {
        hasher.update([0u8]);
        hasher.update(version.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("\"{}-{}\"", content.len(), &digest[..27])
}

/// Decide whether the client's cached copy is still fresh.
///
/// Fresh means the request carries `If-None-Match` listing `etag` (or `*`)
/// and does not ask to bypass caches with `Cache-Control: no-cache`.
pub fn is_fresh(if_none_match: Option<&str>, cache_control: Option<&str>, etag: &str) -> bool {
    let Some(if_none_match) = if_none_match else {
        return false;
    };
    if let Some(cc) = cache_control {
        if cc
            .split(',')
            .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"))
        {
            return false;
        }
    }
    let if_none_match = if_none_match.trim();
    if if_none_match == "*" {
        return true;
    }
    let ours = strip_weak(etag);
    if_none_match
        .split(',')
        .map(|candidate| strip_weak(candidate.trim()))
        .any(|candidate| candidate == ours)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_identical_etag() {
        assert_eq!(content_etag(b"body { }"), content_etag(b"body { }"));
        assert_ne!(content_etag(b"body { }"), content_etag(b"body {}"));
    }

    #[test]
    fn test_version_marker_changes_etag() {
        let a = versioned_etag(b"x", Some("1.0.0"));
        let b = versioned_etag(b"x", Some("1.0.1"));
        assert_ne!(a, b);
        assert_ne!(a, content_etag(b"x"));
    }

    #[test]
    fn test_etag_is_quoted() {
        let tag = content_etag(b"abc");
        assert!(tag.starts_with('"') && tag.ends_with('"'));
    }

    #[test]
    fn test_fresh_matches_list_and_weak() {
        let tag = content_etag(b"abc");
        assert!(is_fresh(Some(&tag), None, &tag));
        assert!(is_fresh(Some(&format!("\"other\", W/{tag}")), None, &tag));
        assert!(is_fresh(Some("*"), None, &tag));
        assert!(!is_fresh(Some("\"other\""), None, &tag));
        assert!(!is_fresh(None, None, &tag));
    }

    #[test]
    fn test_no_cache_is_never_fresh() {
        let tag = content_etag(b"abc");
        assert!(!is_fresh(Some(&tag), Some("max-age=0, no-cache"), &tag));
    }
}
