use autopattern_core::{CatalogError, PatternError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to list {stage}: {source}")]
    Catalog {
        stage: &'static str,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

impl InferenceError {
    pub(crate) fn catalog(stage: &'static str) -> impl FnOnce(CatalogError) -> Self {
        move |source| Self::Catalog { stage, source }
    }
}
