//! Wire types for the Kibana REST API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KibanaError;

// ── /api/status ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct KibanaStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    pub version: StatusVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusVersion {
    pub number: String,
    #[serde(default)]
    pub build_snapshot: bool,
}

/// Semantic version reported by Kibana, pre-release suffix dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KibanaVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl KibanaVersion {
    /// Oldest major version whose API paths this client speaks.
    pub const MIN_SUPPORTED_MAJOR: u64 = 7;

    pub fn is_supported(&self) -> bool {
        self.major >= Self::MIN_SUPPORTED_MAJOR
    }
}

impl FromStr for KibanaVersion {
    type Err = KibanaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s.trim().split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u64, KibanaError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| KibanaError::Version(s.to_string())),
                None if required => Err(KibanaError::Version(s.to_string())),
                None => Ok(0),
            }
        };
        let version = Self {
            major: next(true)?,
            minor: next(false)?,
            patch: next(false)?,
        };
        if parts.next().is_some() {
            return Err(KibanaError::Version(s.to_string()));
        }
        Ok(version)
    }
}

impl fmt::Display for KibanaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ── Saved objects search (.kibana/_search) ───────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub hits: SearchHits,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchHits {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source")]
    pub source: HitSource,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HitSource {
    #[serde(rename = "index-pattern")]
    pub index_pattern: SavedIndexPattern,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SavedIndexPattern {
    pub title: String,
    #[serde(rename = "timeFieldName", default)]
    pub time_field_name: Option<String>,
}

// ── Saved objects writes ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatternAttributes<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_field_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkObject<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attributes: PatternAttributes<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRequest<'a> {
    pub attributes: PatternAttributes<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_and_snapshot_versions() {
        let v: KibanaVersion = "7.10.2".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (7, 10, 2));

        let v: KibanaVersion = "8.0.0-SNAPSHOT".parse().unwrap();
        assert_eq!(v.to_string(), "8.0.0");
        assert!(v.is_supported());

        let v: KibanaVersion = "6.8".parse().unwrap();
        assert_eq!(v, KibanaVersion { major: 6, minor: 8, patch: 0 });
        assert!(!v.is_supported());
    }

    #[test]
    fn rejects_garbage_versions() {
        for bad in ["", "seven", "7.x.1", "7.1.2.3"] {
            assert!(bad.parse::<KibanaVersion>().is_err(), "{bad}");
        }
    }

    #[test]
    fn bulk_object_serializes_in_saved_object_shape() {
        let object = BulkObject {
            kind: "index-pattern",
            attributes: PatternAttributes {
                title: "logs-*",
                time_field_name: Some("@timestamp"),
                fields: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&object).unwrap(),
            serde_json::json!({
                "type": "index-pattern",
                "attributes": { "title": "logs-*", "timeFieldName": "@timestamp" }
            })
        );
    }
}
