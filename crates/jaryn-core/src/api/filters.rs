//! Filter rule endpoints.

use reqwest::Method;
use serde::Deserialize;

use super::ApiClient;
use crate::model::Filter;
use crate::validation::validate_filter;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct FilterList {
    #[serde(default)]
    filters: Vec<Filter>,
}

#[derive(Debug, Deserialize)]
struct FilterEnvelope {
    #[serde(alias = "filter updated successfully")]
    filter: Filter,
}

impl ApiClient {
    /// Lists filter rules in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or a rule cannot be decoded.
    pub async fn list_filters(&self) -> Result<Vec<Filter>> {
        let list: FilterList = self.get_json(&["api", "filters"], &[]).await?;
        Ok(list.filters)
    }

    /// Adds a filter rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending for an incomplete rule,
    /// or an error if the request fails.
    pub async fn add_filter(&self, filter: &Filter) -> Result<Filter> {
        validate_filter(filter).map_err(Error::Validation)?;
        let saved: FilterEnvelope = self
            .send_json(Method::POST, &["api", "filters"], filter)
            .await?;
        Ok(saved.filter)
    }

    /// Replaces a saved filter rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before sending for an incomplete rule,
    /// or an error if the request fails.
    pub async fn update_filter(&self, id: &str, filter: &Filter) -> Result<Filter> {
        validate_filter(filter).map_err(Error::Validation)?;
        let saved: FilterEnvelope = self
            .send_json(Method::PUT, &["api", "filters", id], filter)
            .await?;
        Ok(saved.filter)
    }

    /// Deletes a filter rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_filter(&self, id: &str) -> Result<()> {
        self.call(Method::DELETE, &["api", "filters", id], &[])
            .await
    }
}
