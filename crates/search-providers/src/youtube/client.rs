use crate::youtube::parser::{parse_search_results, ParseError};
use crate::VideoListings;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum SearchProviderError {
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    ParseError(#[from] ParseError),
}

/// Video search against an Invidious compatible JSON API.
pub struct SearchClient {
    client: Client,
    endpoint: String,
    limit: usize,
}

impl SearchClient {
    pub fn create(endpoint: &str, limit: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP Client");

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            limit,
        }
    }

    pub async fn search(&self, query_str: &str) -> Result<VideoListings, SearchProviderError> {
        #[derive(Serialize)]
        struct Query<'a> {
            q: &'a str,
            #[serde(rename = "type")]
            kind: &'a str,
        }

        let query = Query {
            q: query_str,
            kind: "video",
        };

        let response = self
            .client
            .get(format!("{}/api/v1/search", self.endpoint))
            .query(&query)
            .send()
            .await?
            .error_for_status()
            .map_err(|error| {
                error!(?error, "Search provider responded with an error");
                error
            })?;

        let raw_json = response.text().await?;
        let results = parse_search_results(&raw_json, self.limit)?;

        debug!(query = query_str, found = results.len(), "Search finished");

        Ok(results)
    }
}
