pub mod catalog;
pub mod config;
pub mod error;
pub mod pattern;

pub use catalog::{Catalog, CatalogIndex, CatalogPattern, PatternRecord};
pub use config::{
    AutoIndexPatternConfig, Config, GeneralPatternConfig, KibanaConfig, LoggingConfig,
    RefreshIndexPatternConfig,
};
pub use error::*;
pub use pattern::{normalize_title, wildcard_to_regex, CompiledPattern, GroupRole};
