//! Catalog abstraction: the remote system of record for indices and index
//! patterns.
//!
//! The inference and refresh tasks only depend on this trait. The
//! `autopattern-kibana` crate implements it against the Kibana HTTP API; tests
//! use in-memory mocks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// An index name returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogIndex {
    #[serde(rename = "index")]
    pub name: String,
}

impl CatalogIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An index pattern already registered in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogPattern {
    /// Saved-object id, without any type prefix.
    pub id: Option<String>,
    pub title: String,
    pub time_field_name: Option<String>,
    /// Optimistic-concurrency token for updates.
    pub version: Option<String>,
    /// Serialized field list as stored by the catalog.
    pub fields: Option<String>,
}

impl CatalogPattern {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A pattern to create: the title and its time field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub title: String,
    pub time_field_name: String,
}

/// Operations the tasks need from the catalog.
///
/// Calls are plain futures: dropping one aborts the underlying request, which
/// is how callers implement cancellation.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Indices whose name matches the wildcard `filter`.
    async fn indices(&self, filter: &str) -> Result<Vec<CatalogIndex>, CatalogError>;

    /// Existing patterns whose title matches the wildcard `filter`.
    async fn existing_patterns(&self, filter: &str) -> Result<Vec<CatalogPattern>, CatalogError>;

    /// Create (or overwrite) every pattern in one request.
    async fn bulk_create_patterns(
        &self,
        patterns: &HashMap<String, PatternRecord>,
    ) -> Result<(), CatalogError>;

    /// Current field list for the indices a pattern title covers.
    async fn pattern_fields(&self, title: &str) -> Result<serde_json::Value, CatalogError>;

    /// Replace a stored pattern (title, time field and fields).
    async fn update_pattern(&self, pattern: &CatalogPattern) -> Result<(), CatalogError>;
}
