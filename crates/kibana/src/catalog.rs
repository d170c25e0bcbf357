use std::collections::HashMap;

use async_trait::async_trait;
use autopattern_core::{Catalog, CatalogError, CatalogIndex, CatalogPattern, PatternRecord};

use crate::client::KibanaClient;

#[async_trait]
impl Catalog for KibanaClient {
    async fn indices(&self, filter: &str) -> Result<Vec<CatalogIndex>, CatalogError> {
        Ok(KibanaClient::indices(self, filter).await?)
    }

    async fn existing_patterns(&self, filter: &str) -> Result<Vec<CatalogPattern>, CatalogError> {
        Ok(self.index_patterns(filter).await?)
    }

    async fn bulk_create_patterns(
        &self,
        patterns: &HashMap<String, PatternRecord>,
    ) -> Result<(), CatalogError> {
        Ok(self.bulk_create(patterns).await?)
    }

    async fn pattern_fields(&self, title: &str) -> Result<serde_json::Value, CatalogError> {
        Ok(self.fields_for_wildcard(title).await?)
    }

    async fn update_pattern(&self, pattern: &CatalogPattern) -> Result<(), CatalogError> {
        Ok(self.put_index_pattern(pattern).await?)
    }
}
