//! Thin reqwest wrapper over the Kibana endpoints the tasks need.
//!
//! Index and pattern lookups go through Kibana's console proxy so that only
//! Kibana credentials are required, not direct Elasticsearch access.

use std::collections::HashMap;
use std::time::Duration;

use autopattern_core::{CatalogIndex, CatalogPattern, CompiledPattern, KibanaConfig, PatternRecord};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::KibanaError;
use crate::types::{
    BulkObject, KibanaStatus, KibanaVersion, PatternAttributes, SearchResponse, UpdateRequest,
};

const USER_AGENT: &str = concat!("autopattern/", env!("CARGO_PKG_VERSION"));
const SAVED_OBJECT_TYPE: &str = "index-pattern";
const ID_PREFIX: &str = "index-pattern:";
const SEARCH_SIZE: u32 = 10_000;
const META_FIELDS: &[&str] = &["_source", "_id", "_type", "_index", "_score"];

#[derive(Debug, Clone)]
pub struct KibanaClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl KibanaClient {
    pub fn new(config: &KibanaConfig) -> Result<Self, KibanaError> {
        let base_url = config.base_url();
        Url::parse(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert("kbn-xsrf", HeaderValue::from_static("true"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()?;

        let credentials = match (&config.user, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<Response, KibanaError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(KibanaError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Forward a request to Elasticsearch through the console proxy.
    async fn console_proxy(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, KibanaError> {
        let mut request = self
            .request(Method::POST, "/api/console/proxy")
            .query(&[("path", path), ("method", method)]);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::send(request).await
    }

    // ── Status ───────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<KibanaStatus, KibanaError> {
        let response = Self::send(self.request(Method::GET, "/api/status")).await?;
        Ok(response.json().await?)
    }

    pub async fn version(&self) -> Result<KibanaVersion, KibanaError> {
        self.status().await?.version.number.parse()
    }

    /// Ping `/api/status` until it answers, trying `retries + 1` times with
    /// `wait` between attempts.
    pub async fn validate(
        &self,
        retries: u32,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), KibanaError> {
        for attempt in 0..=retries {
            if attempt > 0 {
                info!(
                    "Retrying in {} seconds... ({attempt}/{retries})",
                    wait.as_secs_f64()
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(KibanaError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(KibanaError::Cancelled),
                outcome = self.status() => outcome,
            };
            match outcome {
                Ok(status) => {
                    debug!(name = %status.name, version = %status.version.number, "Kibana reachable");
                    return Ok(());
                }
                Err(e) => warn!(url = %self.base_url, error = %e, "failed to reach Kibana"),
            }
        }
        Err(KibanaError::Unreachable {
            attempts: retries + 1,
        })
    }

    // ── Indices and patterns ─────────────────────────────────────────

    pub async fn indices(&self, filter: &str) -> Result<Vec<CatalogIndex>, KibanaError> {
        let path = format!("_cat/indices/{filter}?format=json&h=index");
        let indices: Vec<CatalogIndex> = self.console_proxy("GET", &path, None).await?.json().await?;
        debug!(filter, count = indices.len(), "listed indices");
        Ok(indices)
    }

    /// Index patterns whose title matches `filter`.
    ///
    /// Titles are analyzed text in the Kibana index and cannot be queried with
    /// wildcards, so every index pattern is fetched and filtered here.
    pub async fn index_patterns(&self, filter: &str) -> Result<Vec<CatalogPattern>, KibanaError> {
        let query = json!({
            "_source": ["index-pattern.title", "index-pattern.timeFieldName"],
            "size": SEARCH_SIZE,
            "query": {
                "bool": {
                    "must": [
                        { "match_phrase": { "type": { "query": SAVED_OBJECT_TYPE } } }
                    ]
                }
            }
        });
        let response: SearchResponse = self
            .console_proxy("POST", ".kibana/_search", Some(&query))
            .await?
            .json()
            .await?;

        let matcher = CompiledPattern::compile(filter)?;
        let patterns: Vec<CatalogPattern> = response
            .hits
            .hits
            .into_iter()
            .filter(|hit| matcher.match_expr().is_match(&hit.source.index_pattern.title))
            .map(|hit| CatalogPattern {
                id: Some(hit.id.strip_prefix(ID_PREFIX).unwrap_or(&hit.id).to_string()),
                title: hit.source.index_pattern.title,
                time_field_name: hit.source.index_pattern.time_field_name,
                version: None,
                fields: None,
            })
            .collect();
        debug!(filter, count = patterns.len(), "listed index patterns");
        Ok(patterns)
    }

    /// Create every pattern in one saved-objects bulk request.
    pub async fn bulk_create(
        &self,
        patterns: &HashMap<String, PatternRecord>,
    ) -> Result<(), KibanaError> {
        if patterns.is_empty() {
            return Ok(());
        }

        let mut records: Vec<&PatternRecord> = patterns.values().collect();
        records.sort_by(|a, b| a.title.cmp(&b.title));
        let objects: Vec<BulkObject<'_>> = records
            .into_iter()
            .map(|record| BulkObject {
                kind: SAVED_OBJECT_TYPE,
                attributes: PatternAttributes {
                    title: &record.title,
                    time_field_name: Some(&record.time_field_name),
                    fields: None,
                },
            })
            .collect();

        let request = self
            .request(Method::POST, "/api/saved_objects/_bulk_create")
            .query(&[("overwrite", "true")])
            .json(&objects);
        Self::send(request).await?;
        Ok(())
    }

    /// Field list Kibana derives for the indices behind `title`.
    pub async fn fields_for_wildcard(&self, title: &str) -> Result<Value, KibanaError> {
        let mut query: Vec<(&str, &str)> = vec![("pattern", title)];
        query.extend(META_FIELDS.iter().map(|f| ("meta_fields", *f)));

        let request = self
            .request(Method::GET, "/api/index_patterns/_fields_for_wildcard")
            .query(&query);
        let mut body: Value = Self::send(request).await?.json().await?;
        match body.get_mut("fields") {
            Some(fields) if fields.is_array() => Ok(fields.take()),
            _ => Err(KibanaError::Decode(format!(
                "no field list returned for '{title}'"
            ))),
        }
    }

    /// Overwrite a stored pattern's attributes.
    pub async fn put_index_pattern(&self, pattern: &CatalogPattern) -> Result<(), KibanaError> {
        let id = pattern.id.as_deref().ok_or_else(|| {
            KibanaError::Decode(format!("index pattern '{}' has no id", pattern.title))
        })?;

        let body = UpdateRequest {
            attributes: PatternAttributes {
                title: &pattern.title,
                time_field_name: pattern.time_field_name.as_deref(),
                fields: pattern.fields.as_deref(),
            },
            version: pattern.version.as_deref(),
        };
        let request = self
            .request(Method::PUT, &format!("/api/saved_objects/{SAVED_OBJECT_TYPE}/{id}"))
            .json(&body);
        Self::send(request).await?;
        Ok(())
    }
}
