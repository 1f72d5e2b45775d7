//! Rendered fetching through a W3C WebDriver server.
//!
//! One browser session is opened by [`WebDriverFetcher::connect`] and reused
//! for every page. Any chromedriver or geckodriver listening on
//! `webdriver_url` will do.

use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use log::{debug, info, warn};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use super::{ClientConfig, DomHandle, FetchMode, FetchedPage, Fetcher, PoliteDelay};
use crate::error::{AnnuaireError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Pause after clicks so that unveiling scripts can run
const SETTLE_AFTER_CLICK: Duration = Duration::from_millis(300);

fn command_error(url: &str, e: CmdError) -> AnnuaireError {
    AnnuaireError::transport(url, e.to_string())
}

/// Browser-backed fetcher
pub struct WebDriverFetcher {
    client: Client,
    config: ClientConfig,
    delay: PoliteDelay,
    closed: AtomicBool,
}

impl WebDriverFetcher {
    /// Open a browser session on the WebDriver server
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let base = format!("{}/", config.webdriver_url.trim_end_matches('/'));
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(&config));

        let client = timeout(Duration::from_secs(config.timeout), builder.connect(&base))
            .await
            .map_err(|_| {
                AnnuaireError::WebDriver(format!(
                    "no answer from {} after {}s",
                    base, config.timeout
                ))
            })?
            .map_err(|e| AnnuaireError::WebDriver(format!("cannot open a session on {}: {}", base, e)))?;
        info!("WebDriver session opened on {} (headless: {})", base, config.headless);

        Ok(Self {
            client,
            delay: PoliteDelay::new(config.polite_delay, config.jitter),
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Poll until the document is complete and the readiness selector is present
    async fn wait_until_quiescent(&self, url: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.quiescence_timeout;

        loop {
            let state = self
                .client
                .execute("return document.readyState", vec![])
                .await
                .map_err(|e| command_error(url, e))?;
            let complete = state.as_str() == Some("complete");
            let selector_present = match &self.config.wait_selector {
                Some(css) if complete => !self
                    .client
                    .find_all(Locator::Css(css))
                    .await
                    .map_err(|e| command_error(url, e))?
                    .is_empty(),
                _ => true,
            };
            if complete && selector_present {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AnnuaireError::Timeout {
                    url: url.to_string(),
                    seconds: self.config.quiescence_timeout.as_secs(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

fn capabilities(config: &ClientConfig) -> Capabilities {
    let mut chrome_args = vec![
        format!("--user-agent={}", config.user_agent),
        "--window-size=1366,900".to_string(),
    ];
    let mut firefox_args = Vec::new();
    if config.headless {
        chrome_args.extend(["--headless=new", "--disable-gpu", "--no-sandbox"].map(String::from));
        firefox_args.push("-headless".to_string());
    }

    let mut caps = Capabilities::new();
    caps.insert("pageLoadStrategy".to_string(), json!("normal"));
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": chrome_args }));
    caps.insert("moz:firefoxOptions".to_string(), json!({ "args": firefox_args }));
    caps
}

#[async_trait]
impl Fetcher for WebDriverFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AnnuaireError::WebDriver("session already closed".to_string()));
        }

        self.delay.wait().await;
        self.client.goto(url).await.map_err(|e| command_error(url, e))?;
        self.wait_until_quiescent(url).await?;
        let html = self.client.source().await.map_err(|e| command_error(url, e))?;
        debug!("Rendered {} ({} bytes)", url, html.len());

        Ok(FetchedPage {
            url: url.to_string(),
            html,
            dom: Some(Box::new(WebDriverDom {
                client: self.client.clone(),
                url: url.to_string(),
            })),
        })
    }

    fn mode(&self) -> FetchMode {
        FetchMode::Rendered
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.client.clone().close().await {
            Ok(()) => {
                info!("WebDriver session closed");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to close WebDriver session: {}", e);
                Err(AnnuaireError::WebDriver(e.to_string()))
            }
        }
    }
}

/// The page currently displayed by the browser session
struct WebDriverDom {
    client: Client,
    url: String,
}

#[async_trait]
impl DomHandle for WebDriverDom {
    async fn click_and_serialize(&self, css: &str) -> Result<Option<String>> {
        let elements = self
            .client
            .find_all(Locator::Css(css))
            .await
            .map_err(|e| command_error(&self.url, e))?;
        if elements.is_empty() {
            return Ok(None);
        }

        for element in &elements {
            if let Err(e) = element.click().await {
                debug!("Click on {} failed: {}", css, e);
            }
        }
        sleep(SETTLE_AFTER_CLICK).await;
        self.client
            .source()
            .await
            .map(Some)
            .map_err(|e| command_error(&self.url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Server, ServerGuard};
    use serde_json::Value;

    /// Key of an element reference in WebDriver responses
    const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

    fn config_for(server: &ServerGuard) -> ClientConfig {
        ClientConfig {
            webdriver_url: server.url(),
            polite_delay: Duration::ZERO,
            quiescence_timeout: Duration::from_millis(500),
            timeout: 5,
            ..Default::default()
        }
    }

    async fn mock_value(server: &mut ServerGuard, method: &str, path: &str, value: Value) -> mockito::Mock {
        server
            .mock(method, path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "value": value }).to_string())
            .create_async()
            .await
    }

    /// A session on `about:blank`, ready to navigate
    async fn mock_session(server: &mut ServerGuard) -> Vec<mockito::Mock> {
        vec![
            mock_value(server, "POST", "/session", json!({ "sessionId": "s1", "capabilities": {} })).await,
            mock_value(server, "GET", "/session/s1/url", json!("about:blank")).await,
            mock_value(server, "POST", "/session/s1/url", Value::Null).await,
        ]
    }

    #[test]
    fn test_headless_capabilities() {
        let caps = capabilities(&ClientConfig::default());
        assert_eq!(caps["moz:firefoxOptions"], json!({ "args": ["-headless"] }));
        let chrome = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(chrome.contains(&json!("--headless=new")));

        let visible = capabilities(&ClientConfig {
            headless: false,
            ..Default::default()
        });
        assert_eq!(visible["moz:firefoxOptions"], json!({ "args": [] }));
    }

    #[tokio::test]
    async fn test_fetch_renders_and_closes() {
        let mut server = Server::new_async().await;
        let session = mock_session(&mut server).await;
        let _ready = mock_value(&mut server, "POST", "/session/s1/execute/sync", json!("complete")).await;
        let _source = mock_value(
            &mut server,
            "GET",
            "/session/s1/source",
            json!("<html><body><h1>Jean DUPONT</h1></body></html>"),
        )
        .await;
        let delete = server
            .mock("DELETE", "/session/s1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value":null}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let fetcher = WebDriverFetcher::connect(config_for(&server)).await.unwrap();
        let page = fetcher.fetch("https://example.org/avocat/1").await.unwrap();
        assert!(page.html.contains("Jean DUPONT"));
        assert!(page.dom.is_some());
        assert_eq!(fetcher.mode(), FetchMode::Rendered);

        fetcher.close().await.unwrap();
        fetcher.close().await.unwrap();
        assert!(fetcher.fetch("https://example.org/avocat/2").await.is_err());

        for mock in &session {
            mock.assert_async().await;
        }
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_driver_is_a_webdriver_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/session")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value":{"error":"session not created","message":"Chrome not found"}}"#)
            .create_async()
            .await;

        let result = WebDriverFetcher::connect(config_for(&server)).await;
        assert!(matches!(result, Err(AnnuaireError::WebDriver(_))));
    }

    #[tokio::test]
    async fn test_quiescence_timeout() {
        let mut server = Server::new_async().await;
        let _session = mock_session(&mut server).await;
        let _ready = mock_value(&mut server, "POST", "/session/s1/execute/sync", json!("loading")).await;

        let fetcher = WebDriverFetcher::connect(config_for(&server)).await.unwrap();
        let result = fetcher.fetch("https://example.org/slow").await;
        assert!(matches!(result, Err(AnnuaireError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_click_and_serialize() {
        let mut server = Server::new_async().await;
        let _session = mock_session(&mut server).await;
        let _ready = mock_value(&mut server, "POST", "/session/s1/execute/sync", json!("complete")).await;
        let _source = mock_value(
            &mut server,
            "GET",
            "/session/s1/source",
            json!("<a href=\"mailto:jean@dupont-avocat.fr\">jean@dupont-avocat.fr</a>"),
        )
        .await;
        let _elements = mock_value(
            &mut server,
            "POST",
            "/session/s1/elements",
            json!([{ ELEMENT_KEY: "e1" }]),
        )
        .await;
        let click = mock_value(&mut server, "POST", "/session/s1/element/e1/click", Value::Null).await;

        let fetcher = WebDriverFetcher::connect(config_for(&server)).await.unwrap();
        let page = fetcher.fetch("https://example.org/avocat/1").await.unwrap();
        let dom = page.dom.unwrap();
        let html = dom.click_and_serialize(".cloak").await.unwrap().unwrap();

        assert!(html.contains("jean@dupont-avocat.fr"));
        click.assert_async().await;
    }
}
