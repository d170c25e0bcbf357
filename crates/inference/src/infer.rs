//! Inference for a single template.

use std::collections::HashMap;

use autopattern_core::config::GeneralPatternConfig;
use autopattern_core::pattern::EXPAND_WILDCARD;
use autopattern_core::{
    wildcard_to_regex, Catalog, CompiledPattern, GroupRole, PatternError, PatternRecord,
};
use regex::Regex;
use tracing::debug;

use crate::error::InferenceError;

/// A compiled template plus the time field of the patterns derived from it.
#[derive(Debug, Clone)]
pub struct Template {
    pattern: CompiledPattern,
    time_field_name: String,
}

impl Template {
    pub fn new(raw: &str, time_field_name: impl Into<String>) -> Result<Self, PatternError> {
        Ok(Self {
            pattern: CompiledPattern::compile(raw)?,
            time_field_name: time_field_name.into(),
        })
    }

    pub fn from_config(config: &GeneralPatternConfig) -> Result<Self, PatternError> {
        Self::new(&config.pattern, config.time_field_name.clone())
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn raw(&self) -> &str {
        self.pattern.raw()
    }

    pub fn time_field_name(&self) -> &str {
        &self.time_field_name
    }

    /// Wildcard filter sent to the catalog.
    pub fn filter(&self) -> &str {
        self.pattern.normalized_title()
    }
}

/// Matches index names already covered by an existing pattern.
///
/// Built from zero titles it matches nothing.
#[derive(Debug, Clone)]
pub struct CoveredMatcher {
    expr: Option<Regex>,
}

impl CoveredMatcher {
    pub fn from_titles<'a>(titles: impl IntoIterator<Item = &'a str>) -> Result<Self, PatternError> {
        let alternatives: Vec<String> = titles.into_iter().map(wildcard_to_regex).collect();
        if alternatives.is_empty() {
            return Ok(Self { expr: None });
        }

        let joined = alternatives.join("|");
        let expr = Regex::new(&joined).map_err(|source| PatternError::Regex {
            pattern: joined.clone(),
            source,
        })?;
        Ok(Self { expr: Some(expr) })
    }

    pub fn is_covered(&self, index: &str) -> bool {
        self.expr.as_ref().is_some_and(|expr| expr.is_match(index))
    }
}

/// Derive the pattern title for `index` from `pattern`.
///
/// Walking the wildcards left to right, a `?` position takes the text its
/// group captured and a `*` position stays `*`. A name the template does not
/// match yields the template's normalized title.
pub fn synthesize_title(pattern: &CompiledPattern, index: &str) -> String {
    let normalized = pattern.normalized_title();
    let Some(captures) = pattern.match_expr().captures(index) else {
        return normalized.to_string();
    };

    let mut pieces = normalized.split(EXPAND_WILDCARD);
    let mut title = String::with_capacity(index.len());
    title.push_str(pieces.next().unwrap_or_default());

    for (group, piece) in pieces.enumerate() {
        match pattern.group_roles().get(group) {
            Some(GroupRole::Capture) => {
                title.push_str(captures.get(group + 1).map_or("", |m| m.as_str()))
            }
            _ => title.push(EXPAND_WILDCARD),
        }
        title.push_str(piece);
    }
    title
}

/// Find the indices matching `template` that no existing pattern covers and
/// derive one pattern per distinct synthesized title.
pub async fn infer(
    catalog: &dyn Catalog,
    template: &Template,
) -> Result<HashMap<String, PatternRecord>, InferenceError> {
    let filter = template.filter();

    let existing = catalog
        .existing_patterns(filter)
        .await
        .map_err(InferenceError::catalog("existing index patterns"))?;
    let covered = CoveredMatcher::from_titles(existing.iter().map(|p| p.title.as_str()))?;

    let indices = catalog
        .indices(filter)
        .await
        .map_err(InferenceError::catalog("indices"))?;

    let mut inferred = HashMap::new();
    for index in indices.iter().filter(|i| !covered.is_covered(&i.name)) {
        let title = synthesize_title(template.pattern(), &index.name);
        inferred.entry(title.clone()).or_insert_with(|| PatternRecord {
            title,
            time_field_name: template.time_field_name().to_string(),
        });
    }

    debug!(
        template = %template.raw(),
        existing = existing.len(),
        indices = indices.len(),
        inferred = inferred.len(),
        "inferred index patterns"
    );
    Ok(inferred)
}
