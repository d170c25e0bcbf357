//! Kibana HTTP client implementing the [`Catalog`](autopattern_core::Catalog)
//! trait against the 7.x REST API.

mod catalog;
pub mod client;
pub mod error;
pub mod types;

pub use client::KibanaClient;
pub use error::KibanaError;
pub use types::{KibanaStatus, KibanaVersion};
