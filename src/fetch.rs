use std::time::Duration;

use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::error::ScrapeError;

pub struct Fetcher {
    client: Client,
    max_retries: u32,
    retry_base: Duration,
}

impl Fetcher {
    pub fn new(
        user_agent: &str,
        accept_language: &str,
        max_retries: u32,
        retry_base: Duration,
    ) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(user_agent)?);
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_str(accept_language)?,
        );

        let client = Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            max_retries,
            retry_base,
        })
    }

    pub async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.get(url, None).await?;
        Ok(response.text().await?)
    }

    /// Fetches a binary body, returning it together with the response
    /// Content-Type so the caller can pick a file extension.
    pub async fn get_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ScrapeError> {
        let response = self.get(url, None).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Ok((response.bytes().await?.to_vec(), content_type))
    }

    /// Session warm-up against the listing root, mirroring the site's
    /// "load more" XHR endpoint. Failures are reported, not acted on.
    pub async fn probe_load_more(&self, url: &str) -> Result<(), ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-requested-with",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        self.get(url, Some(headers)).await.map(|_| ())
    }

    async fn get(
        &self,
        url: &str,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, ScrapeError> {
        let mut attempt = 0u32;
        loop {
            let mut request = self.client.get(url);
            if let Some(headers) = &extra_headers {
                request = request.headers(headers.clone());
            }
            let response = request.send().await?;

            match response.status() {
                status if status.is_success() => return Ok(response),
                StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(ScrapeError::RateLimitExhausted {
                            url: url.to_string(),
                            attempts: attempt + 1,
                        });
                    }
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        %url,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "Too Many Requests. Waiting..."
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                StatusCode::GONE => {
                    return Err(ScrapeError::Gone {
                        url: url.to_string(),
                    })
                }
                status => {
                    return Err(ScrapeError::Http {
                        status,
                        url: url.to_string(),
                    })
                }
            }
        }
    }

    // base * 2^attempt, plus up to a quarter of the base as jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_base.as_millis() as u64;
        let scaled = base_ms.saturating_mul(1u64 << attempt.min(6));
        let jitter = rand::rng().random_range(0..=base_ms / 4);
        Duration::from_millis(scaled.saturating_add(jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher(max_retries: u32) -> Fetcher {
        Fetcher::new("test-agent", "ru", max_retries, Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn retries_after_rate_limit_and_returns_final_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("catalog"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let body = fetcher
            .get_text(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "catalog");
    }

    #[tokio::test]
    async fn gives_up_after_retry_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(2);
        let err = fetcher
            .get_text(&format!("{}/page", server.uri()))
            .await
            .unwrap_err();
        match err {
            ScrapeError::RateLimitExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn gone_is_reported_as_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product/1"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        let err = fetcher
            .get_text(&format!("{}/product/1", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Gone { .. }));
    }

    #[tokio::test]
    async fn other_statuses_surface_as_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        let err = fetcher
            .get_text(&format!("{}/page", server.uri()))
            .await
            .unwrap_err();
        match err {
            ScrapeError::Http { status, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn get_bytes_reports_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8], "image/jpeg"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        let (bytes, content_type) = fetcher
            .get_bytes(&format!("{}/img.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8]);
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn load_more_probe_sends_xhr_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog"))
            .and(header("x-requested-with", "XMLHttpRequest"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        fetcher
            .probe_load_more(&format!("{}/catalog", server.uri()))
            .await
            .unwrap();
    }
}
