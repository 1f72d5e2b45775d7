use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::sleep;

use super::{ClientConfig, FetchMode, FetchedPage, Fetcher, PoliteDelay};
use crate::error::{AnnuaireError, Result};

/// Plain HTTP fetcher: the page as served, no script execution
pub struct HttpFetcher {
    http_client: Client,
    config: ClientConfig,
    delay: PoliteDelay,
}

impl HttpFetcher {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .pool_max_idle_per_host(4)
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            delay: PoliteDelay::new(config.polite_delay, config.jitter),
            http_client,
            config,
        })
    }

    /// GET with exponential backoff on transport errors, timeouts, 429 and 5xx
    async fn execute_with_retry(&self, url: &str) -> Result<Response> {
        let mut last_error = None;
        let mut retry_delay = Duration::from_millis(self.config.retry_base_delay);

        for attempt in 0..self.config.max_retries.max(1) {
            if attempt > 0 {
                debug!("Retrying {} (attempt {})", url, attempt + 1);
                sleep(retry_delay).await;
                retry_delay *= 2;
            }

            self.delay.wait().await;
            match self.http_client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let error = AnnuaireError::HttpStatus {
                        status: response.status().as_u16(),
                        url: url.to_string(),
                    };
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    warn!("{}", error);
                    last_error = Some(error);
                }
                Err(e) => {
                    let error = self.classify(url, e);
                    warn!("{}", error);
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AnnuaireError::transport(url, "request failed after all retries")
        }))
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> AnnuaireError {
        if error.is_timeout() {
            AnnuaireError::Timeout {
                url: url.to_string(),
                seconds: self.config.timeout,
            }
        } else {
            AnnuaireError::Network(error)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.execute_with_retry(url).await?;
        // Decodes using the charset announced by the server
        let html = response
            .text()
            .await
            .map_err(|e| AnnuaireError::transport(url, e.to_string()))?;
        debug!("Fetched {} ({} bytes)", url, html.len());

        Ok(FetchedPage {
            url: url.to_string(),
            html,
            dom: None,
        })
    }

    fn mode(&self) -> FetchMode {
        FetchMode::Static
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn quick_config(max_retries: u32) -> ClientConfig {
        ClientConfig {
            max_retries,
            retry_base_delay: 1,
            polite_delay: Duration::ZERO,
            timeout: 5,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/avocat/1")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<h1>Maître DUPONT</h1>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(quick_config(3)).unwrap();
        let page = fetcher
            .fetch(&format!("{}/avocat/1", server.url()))
            .await
            .unwrap();

        assert!(page.html.contains("Maître DUPONT"));
        assert!(page.dom.is_none());
        assert_eq!(fetcher.mode(), FetchMode::Static);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/liste")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(quick_config(3)).unwrap();
        let result = fetcher.fetch(&format!("{}/liste", server.url())).await;

        assert!(matches!(
            result,
            Err(AnnuaireError::HttpStatus { status: 503, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/absent")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(quick_config(3)).unwrap();
        let result = fetcher.fetch(&format!("{}/absent", server.url())).await;

        assert!(matches!(
            result,
            Err(AnnuaireError::HttpStatus { status: 404, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latin1_body_is_decoded() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/latin1")
            .with_status(200)
            .with_header("content-type", "text/html; charset=iso-8859-1")
            .with_body(b"<p>T\xe9l : 03 21 56 25 57</p>".to_vec())
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(quick_config(1)).unwrap();
        let page = fetcher.fetch(&format!("{}/latin1", server.url())).await.unwrap();
        assert!(page.html.contains("Tél"));
    }
}
