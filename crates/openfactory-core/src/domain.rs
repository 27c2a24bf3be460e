//! Core domain newtypes: asset identifiers and group names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, non-empty identifier for a factory asset. The routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetUuid(String);

impl AssetUuid {
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, non-empty logical group name (e.g. a UNS workcenter level).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupName(String);

/// Sentinel the grouping strategy returns for "this asset has no group".
pub const UNAVAILABLE_GROUP: &str = "UNAVAILABLE";

impl GroupName {
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() || raw == UNAVAILABLE_GROUP {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// DNS-safe form used for instance/container naming: lowercase, runs of
    /// non-alphanumerics collapsed to a single `-`, leading/trailing `-`
    /// stripped.
    pub fn sanitized(&self) -> String {
        sanitize_group_name(&self.0)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Standalone sanitisation helper, usable without a `GroupName` wrapper
/// (e.g. for property tests over arbitrary strings).
pub fn sanitize_group_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_mixed_punctuation() {
        assert_eq!(sanitize_group_name("Line 1 / Press-A"), "line-1-press-a");
    }

    #[test]
    fn strips_leading_trailing_dashes() {
        assert_eq!(sanitize_group_name("--WC 7--"), "wc-7");
    }

    #[test]
    fn unavailable_sentinel_is_not_a_group() {
        assert!(GroupName::parse(UNAVAILABLE_GROUP).is_none());
    }

    #[test]
    fn empty_is_not_a_group() {
        assert!(GroupName::parse("   ").is_none());
        assert!(AssetUuid::parse("").is_none());
    }
}
