//! HTTP client for the fantasy points feed.

use async_trait::async_trait;
use hodlerfc::feed::{parse_feed_document, FeedFilter};
use hodlerfc::interface::FantasyFeed;
use hodlerfc::model::FantasyFeedEntry;
use hodlerfc::ExternalError;
use reqwest::Client;
use url::Url;

/// Reads the published feed document from a fixed URL.
pub struct HttpFeed {
    /// HTTP client.
    pub client: Client,
    /// Document URL.
    pub url: Url,
}

#[async_trait(?Send)]
impl FantasyFeed for HttpFeed {
    async fn fetch_fantasy_feed(
        &self,
        filter: &FeedFilter,
    ) -> Result<Vec<FantasyFeedEntry>, ExternalError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| format!("GET {} failed: {}", self.url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("GET {}: HTTP {}", self.url, status).into());
        }
        let document = resp
            .bytes()
            .await
            .map_err(|e| format!("GET {} body: {}", self.url, e))?;
        let entries = parse_feed_document(&document, filter)?;
        log::debug!("Feed {} has {} matching entries.", self.url, entries.len());
        Ok(entries)
    }
}
