//! Page retrieval.
//!
//! A [`Fetcher`] turns a URL into HTML, either as served over plain HTTP
//! ([`HttpFetcher`]) or after a real browser has executed the page's
//! scripts ([`WebDriverFetcher`]). The polite delay between two requests is
//! enforced here and nowhere else.

pub mod delay;
pub mod http;
pub mod webdriver;

pub use crate::config::FetchMode;
pub use delay::PoliteDelay;
pub use http::HttpFetcher;
pub use webdriver::WebDriverFetcher;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::config::{Config, SiteDescriptor};
use crate::error::Result;

/// Default deadline for a rendered page to settle, in seconds
pub const DEFAULT_QUIESCENCE_SECS: u64 = 20;

/// A retrieved page
pub struct FetchedPage {
    /// URL as requested
    pub url: String,
    pub html: String,
    /// Live document, rendered mode only
    pub dom: Option<Box<dyn DomHandle>>,
}

impl fmt::Debug for FetchedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedPage")
            .field("url", &self.url)
            .field("html_len", &self.html.len())
            .field("has_dom", &self.dom.is_some())
            .finish()
    }
}

/// Interaction with a page still open in the browser
#[async_trait]
pub trait DomHandle: Send + Sync {
    /// Click every element matching `css` and return the re-serialized document,
    /// or `None` when nothing matched
    async fn click_and_serialize(&self, css: &str) -> Result<Option<String>>;
}

/// Retrieves pages for the walker and the assembler
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    fn mode(&self) -> FetchMode;

    /// Release the underlying resources; safe to call more than once
    async fn close(&self) -> Result<()>;
}

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds
    pub timeout: u64,
    /// Maximum number of attempts per request
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay: u64,
    pub user_agent: String,
    /// Minimum pause between two requests
    pub polite_delay: Duration,
    /// Upper bound of the random extra pause
    pub jitter: Duration,
    pub webdriver_url: String,
    pub headless: bool,
    /// Deadline for a rendered page to settle
    pub quiescence_timeout: Duration,
    /// Element whose presence marks a rendered page as ready
    pub wait_selector: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: crate::config::DEFAULT_TIMEOUT_SECS,
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            retry_base_delay: 500,
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            polite_delay: Duration::from_millis(1500),
            jitter: Duration::ZERO,
            webdriver_url: crate::config::DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            quiescence_timeout: Duration::from_secs(DEFAULT_QUIESCENCE_SECS),
            wait_selector: None,
        }
    }
}

impl ClientConfig {
    /// Combine the application settings with a site's politeness and readiness rules
    pub fn for_site(config: &Config, site: &SiteDescriptor) -> Self {
        Self {
            timeout: config.fetch.timeout,
            max_retries: config.fetch.max_retries,
            user_agent: config.fetch.user_agent.clone(),
            polite_delay: Duration::from_secs_f64(site.polite_delay_seconds.max(0.0)),
            jitter: Duration::from_secs_f64(site.delay_jitter_seconds.max(0.0)),
            webdriver_url: config.webdriver.url.clone(),
            wait_selector: site.selectors.wait_for.clone(),
            ..Self::default()
        }
    }
}

/// Factory for creating fetchers
pub struct FetcherFactory;

impl FetcherFactory {
    /// Create the fetcher matching `mode`; rendered mode opens a browser session
    pub async fn create(mode: FetchMode, config: ClientConfig) -> Result<Box<dyn Fetcher>> {
        match mode {
            FetchMode::Static => Ok(Box::new(HttpFetcher::new(config)?)),
            FetchMode::Rendered => Ok(Box::new(WebDriverFetcher::connect(config).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_for_site() {
        let mut config = Config::default();
        config.fetch.timeout = 12;
        let mut site = SiteDescriptor::new("arras", "https://example.org/");
        site.polite_delay_seconds = 0.25;
        site.selectors.wait_for = Some(".fiche".to_string());

        let client = ClientConfig::for_site(&config, &site);
        assert_eq!(client.timeout, 12);
        assert_eq!(client.polite_delay, Duration::from_millis(250));
        assert_eq!(client.wait_selector.as_deref(), Some(".fiche"));
        assert!(client.headless);
    }
}
