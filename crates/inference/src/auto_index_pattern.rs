//! Scheduled task that creates the index patterns missing for every
//! configured template.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use autopattern_core::{AutoIndexPatternConfig, Catalog, PatternRecord};
use autopattern_scheduler::{Task, TaskReport};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::InferenceError;
use crate::infer::{infer, Template};
use crate::pool::run_bounded;
use crate::set::InferredPatternSet;

pub const TASK_NAME: &str = "Auto Index Pattern";

/// Runs [`infer`] for every template with bounded parallelism, then creates
/// the union of the results in a single bulk call.
pub struct AutoIndexPattern {
    catalog: Arc<dyn Catalog>,
    templates: Vec<Arc<Template>>,
    concurrency: usize,
}

impl AutoIndexPattern {
    pub fn new(catalog: Arc<dyn Catalog>, templates: Vec<Template>, concurrency: usize) -> Self {
        Self {
            catalog,
            templates: templates.into_iter().map(Arc::new).collect(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(
        config: &AutoIndexPatternConfig,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self, InferenceError> {
        let templates = config
            .general_patterns
            .iter()
            .map(Template::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(catalog, templates, config.concurrency))
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().map(|t| t.as_ref())
    }

    /// Infer across all templates. Returns `None` when cancelled.
    pub async fn collect(&self, cancel: &CancellationToken) -> Option<HashMap<String, PatternRecord>> {
        let set = Arc::new(InferredPatternSet::new());

        run_bounded(self.templates.iter().cloned(), self.concurrency, cancel, |template| {
            let catalog = self.catalog.clone();
            let set = set.clone();
            async move {
                match infer(catalog.as_ref(), &template).await {
                    Ok(found) => {
                        let added = set.merge(found);
                        debug!(template = %template.raw(), added, "template inferred");
                    }
                    Err(e) => warn!(
                        template = %template.raw(),
                        error = %e,
                        "failed to infer index patterns for template, skipping it"
                    ),
                }
            }
        })
        .await;

        if cancel.is_cancelled() {
            return None;
        }
        Some(match Arc::try_unwrap(set) {
            Ok(set) => set.into_inner(),
            Err(shared) => shared.snapshot(),
        })
    }
}

#[async_trait]
impl Task for AutoIndexPattern {
    fn name(&self) -> &str {
        TASK_NAME
    }

    async fn run(&self, cancel: CancellationToken) -> TaskReport {
        let Some(patterns) = self.collect(&cancel).await else {
            return TaskReport::cancelled();
        };
        if patterns.is_empty() {
            info!("No new Index Patterns to create.");
            return TaskReport::completed(0);
        }

        let mut titles: Vec<&str> = patterns.keys().map(String::as_str).collect();
        titles.sort_unstable();

        let created = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TaskReport::cancelled(),
            created = self.catalog.bulk_create_patterns(&patterns) => created,
        };
        match created {
            Ok(()) => {
                info!(patterns = ?titles, "Successfully created {} Index Patterns.", titles.len());
                TaskReport::completed(titles.len())
            }
            Err(e) => {
                error!(error = %e, patterns = ?titles, "failed to bulk create index patterns");
                TaskReport::completed(0)
            }
        }
    }
}
