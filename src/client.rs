use crate::{Result, ScraperConfig, ScraperError, MIN_RESPONSE_LEN};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

/// The `PageFetcher` struct issues the vendor page requests.
/// It wraps a `reqwest` client configured with browser-like headers and the request timeout.
pub struct PageFetcher {
    /// The HTTP client used for making requests.
    client: Client,
    /// The configuration settings for the scraper.
    config: ScraperConfig,
}

impl PageFetcher {
    /// Creates a new `PageFetcher` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration settings for the scraper.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `PageFetcher` instance, or an error if the client could not be created.
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(ScraperError::RequestError)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Fetches one page and validates that it is worth parsing.
    ///
    /// # Arguments
    ///
    /// * `url` - The page URL, query string included.
    ///
    /// # Returns
    ///
    /// The page body, or a typed error for a timeout, a connection failure, a non-success
    /// status, or a body shorter than `MIN_RESPONSE_LEN`.
    #[instrument(skip(self))]
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Connection", "keep-alive")
            .header("Upgrade-Insecure-Requests", "1")
            .header("Referer", &self.config.hitachi.referer)
            .send()
            .await
            .map_err(|e| ScraperError::from_transport(e, url, self.config.timeout))?;

        let status = response.status();
        debug!("Response status: {}", status);

        match status {
            StatusCode::NOT_FOUND => warn!("Page not found (404): {}", url),
            StatusCode::FORBIDDEN => warn!("Access forbidden (403): {}", url),
            _ => {}
        }

        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScraperError::from_transport(e, url, self.config.timeout))?;

        if html.len() < MIN_RESPONSE_LEN {
            return Err(ScraperError::EmptyResponse(html.len()));
        }

        Ok(html)
    }

    /// Posts a JSON body and decodes the JSON answer.
    ///
    /// # Arguments
    ///
    /// * `url` - The endpoint.
    /// * `headers` - Extra headers, such as API credentials.
    /// * `body` - The request payload.
    pub async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<T> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScraperError::from_transport(e, url, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}
