//! Scheduled task that re-reads the field list of existing index patterns,
//! so fields added to the underlying indices show up in the catalog.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use autopattern_core::{Catalog, CatalogError, CatalogPattern, RefreshIndexPatternConfig};
use autopattern_scheduler::{Task, TaskReport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pool::run_bounded;

pub const TASK_NAME: &str = "Refresh Index Pattern Fields";

pub struct RefreshIndexPattern {
    catalog: Arc<dyn Catalog>,
    filters: Vec<String>,
    concurrency: usize,
}

impl RefreshIndexPattern {
    pub fn new(catalog: Arc<dyn Catalog>, filters: Vec<String>, concurrency: usize) -> Self {
        Self {
            catalog,
            filters,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &RefreshIndexPatternConfig, catalog: Arc<dyn Catalog>) -> Self {
        Self::new(catalog, config.patterns.clone(), config.concurrency)
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Existing patterns matching any filter, each listed once.
    async fn matching_patterns(&self, cancel: &CancellationToken) -> Vec<CatalogPattern> {
        let batches = run_bounded(self.filters.clone(), self.concurrency, cancel, |filter| {
            let catalog = self.catalog.clone();
            async move {
                match catalog.existing_patterns(&filter).await {
                    Ok(patterns) => patterns,
                    Err(e) => {
                        warn!(pattern = %filter, error = %e, "failed to get index patterns matching filter");
                        Vec::new()
                    }
                }
            }
        })
        .await;

        let mut seen = HashSet::new();
        batches
            .into_iter()
            .flatten()
            .filter(|p| seen.insert(p.id.clone().unwrap_or_else(|| p.title.clone())))
            .collect()
    }
}

async fn refresh_pattern(
    catalog: &dyn Catalog,
    mut pattern: CatalogPattern,
) -> Result<(), CatalogError> {
    let fields = catalog.pattern_fields(&pattern.title).await?;
    pattern.fields = Some(fields.to_string());
    catalog.update_pattern(&pattern).await
}

#[async_trait]
impl Task for RefreshIndexPattern {
    fn name(&self) -> &str {
        TASK_NAME
    }

    async fn run(&self, cancel: CancellationToken) -> TaskReport {
        let patterns = self.matching_patterns(&cancel).await;
        if cancel.is_cancelled() {
            return TaskReport::cancelled();
        }
        debug!(patterns = patterns.len(), "refreshing index pattern fields");

        let outcomes = run_bounded(patterns, self.concurrency, &cancel, |pattern| {
            let catalog = self.catalog.clone();
            async move {
                let title = pattern.title.clone();
                match refresh_pattern(catalog.as_ref(), pattern).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(pattern = %title, error = %e, "failed to refresh index pattern fields");
                        false
                    }
                }
            }
        })
        .await;

        if cancel.is_cancelled() {
            return TaskReport::cancelled();
        }
        let updated = outcomes.into_iter().filter(|ok| *ok).count();
        info!("Finished updating Index Pattern fields, updated ({updated}) Index Patterns.");
        TaskReport::completed(updated)
    }
}
