//! In-memory catalog for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use autopattern_core::{
    wildcard_to_regex, Catalog, CatalogError, CatalogIndex, CatalogPattern, PatternRecord,
};
use regex::Regex;

#[derive(Default)]
pub(crate) struct MockCatalog {
    indices: Vec<String>,
    patterns: Vec<CatalogPattern>,
    failing_filters: HashSet<String>,
    failing_titles: HashSet<String>,
    fail_bulk: bool,
    lookup_delay: Option<Duration>,
    pub bulk_calls: Mutex<Vec<HashMap<String, PatternRecord>>>,
    pub updates: Mutex<Vec<CatalogPattern>>,
    pub lookups: AtomicUsize,
    /// Value of `lookups` when each bulk call arrived.
    pub lookups_at_bulk: Mutex<Vec<usize>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indices(mut self, names: &[&str]) -> Self {
        self.indices = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_patterns(mut self, titles: &[&str]) -> Self {
        self.patterns = titles
            .iter()
            .enumerate()
            .map(|(i, title)| CatalogPattern {
                id: Some(format!("id-{i}")),
                title: title.to_string(),
                time_field_name: Some("@timestamp".into()),
                version: Some(format!("WzEsMV0={i}")),
                fields: None,
            })
            .collect();
        self
    }

    /// Lookups for this filter fail.
    pub fn failing_filter(mut self, filter: &str) -> Self {
        self.failing_filters.insert(filter.to_string());
        self
    }

    /// Field lookups for this pattern title fail.
    pub fn failing_title(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    pub fn failing_bulk(mut self) -> Self {
        self.fail_bulk = true;
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn bulk_calls(&self) -> Vec<HashMap<String, PatternRecord>> {
        self.bulk_calls.lock().unwrap().clone()
    }

    pub fn lookups_at_bulk(&self) -> Vec<usize> {
        self.lookups_at_bulk.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<CatalogPattern> {
        self.updates.lock().unwrap().clone()
    }

    async fn lookup(&self, filter: &str) -> Result<Regex, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_filters.contains(filter) {
            return Err(CatalogError::Status {
                status: 500,
                body: format!("lookup for {filter} failed"),
            });
        }
        Ok(Regex::new(&wildcard_to_regex(filter)).unwrap())
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn indices(&self, filter: &str) -> Result<Vec<CatalogIndex>, CatalogError> {
        let expr = self.lookup(filter).await?;
        let anchored = Regex::new(&format!("^(?:{})$", expr.as_str())).unwrap();
        Ok(self
            .indices
            .iter()
            .filter(|name| anchored.is_match(name))
            .map(CatalogIndex::new)
            .collect())
    }

    async fn existing_patterns(&self, filter: &str) -> Result<Vec<CatalogPattern>, CatalogError> {
        let expr = self.lookup(filter).await?;
        Ok(self
            .patterns
            .iter()
            .filter(|p| expr.is_match(&p.title))
            .cloned()
            .collect())
    }

    async fn bulk_create_patterns(
        &self,
        patterns: &HashMap<String, PatternRecord>,
    ) -> Result<(), CatalogError> {
        self.lookups_at_bulk
            .lock()
            .unwrap()
            .push(self.lookups.load(Ordering::SeqCst));
        self.bulk_calls.lock().unwrap().push(patterns.clone());
        if self.fail_bulk {
            return Err(CatalogError::Request("connection reset".into()));
        }
        Ok(())
    }

    async fn pattern_fields(&self, title: &str) -> Result<serde_json::Value, CatalogError> {
        if self.failing_titles.contains(title) {
            return Err(CatalogError::Status {
                status: 404,
                body: format!("no indices match {title}"),
            });
        }
        Ok(serde_json::json!([
            { "name": "@timestamp", "type": "date", "searchable": true, "aggregatable": true },
            { "name": "message", "type": "string", "searchable": true, "aggregatable": false },
        ]))
    }

    async fn update_pattern(&self, pattern: &CatalogPattern) -> Result<(), CatalogError> {
        self.updates.lock().unwrap().push(pattern.clone());
        Ok(())
    }
}
