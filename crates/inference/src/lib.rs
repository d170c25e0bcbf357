//! Index-pattern inference and the maintenance tasks built on it.
//!
//! [`infer`] derives the missing pattern titles for one template.
//! [`AutoIndexPattern`] runs it for every configured template and writes the
//! union in one bulk call; [`RefreshIndexPattern`] re-reads the field lists
//! of existing patterns.

pub mod auto_index_pattern;
pub mod error;
pub mod infer;
mod pool;
pub mod refresh;
pub mod set;

pub use auto_index_pattern::AutoIndexPattern;
pub use error::InferenceError;
pub use infer::{infer, synthesize_title, CoveredMatcher, Template};
pub use refresh::RefreshIndexPattern;
pub use set::InferredPatternSet;

#[cfg(test)]
pub(crate) mod testing;
