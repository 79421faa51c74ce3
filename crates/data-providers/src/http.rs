use market_core::MarketError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
pub struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let Some(&oldest) = ts.front() else {
                continue;
            };
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for a request slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// reqwest client plus the provider's throttle and error mapping.
#[derive(Clone)]
pub struct HttpClient {
    provider: &'static str,
    client: Client,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    pub fn new(provider: &'static str, requests_per_minute: usize) -> Self {
        Self {
            provider,
            client: build_client(),
            rate_limiter: Some(RateLimiter::per_minute(requests_per_minute)),
        }
    }

    /// No client-side throttling.
    pub fn unthrottled(provider: &'static str) -> Self {
        Self {
            provider,
            client: build_client(),
            rate_limiter: None,
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Sends the request and decodes a successful JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, MarketError> {
        let body = self.send_text(builder).await?;
        serde_json::from_str(&body).map_err(|e| {
            MarketError::MalformedUpstreamResponse(format!("{}: {}", self.provider, e))
        })
    }

    /// Sends the request and returns the raw body of a 2xx response.
    pub async fn send_text(&self, builder: RequestBuilder) -> Result<String, MarketError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let response = builder.send().await.map_err(|e| transport_error(self.provider, &e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(self.provider, &e))?;

        if !(200..300).contains(&status) {
            tracing::debug!("{} returned HTTP {}", self.provider, status);
            return Err(map_status(self.provider, status, &body));
        }
        Ok(body)
    }
}

fn build_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn transport_error(provider: &str, err: &reqwest::Error) -> MarketError {
    if err.is_timeout() {
        MarketError::UpstreamUnavailable(format!("{}: request timed out", provider))
    } else {
        MarketError::UpstreamUnavailable(format!("{}: {}", provider, err))
    }
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub fn map_status(provider: &str, status: u16, body: &str) -> MarketError {
    match status {
        401 => MarketError::UpstreamAuthRejected(provider.to_string()),
        403 => MarketError::UpstreamServerError {
            code: 403,
            message: format!("API key invalid or rate limit exceeded: {}", error_message(body)),
        },
        404 => MarketError::UpstreamNotFound(format!("{}: {}", provider, error_message(body))),
        429 => MarketError::UpstreamRateLimited(provider.to_string()),
        code => MarketError::UpstreamServerError {
            code,
            message: error_message(body),
        },
    }
}

/// The JSON `message`/`error` field when present, else the raw body.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("p", 401, "").kind(), ErrorKind::UpstreamAuthRejected);
        assert_eq!(map_status("p", 404, "").kind(), ErrorKind::UpstreamNotFound);
        assert_eq!(map_status("p", 429, "").kind(), ErrorKind::UpstreamRateLimited);
        assert_eq!(
            map_status("p", 403, r#"{"error":"bad key"}"#),
            MarketError::UpstreamServerError {
                code: 403,
                message: "API key invalid or rate limit exceeded: bad key".into()
            }
        );
        assert_eq!(
            map_status("p", 500, r#"{"message":"boom"}"#),
            MarketError::UpstreamServerError { code: 500, message: "boom".into() }
        );
        assert_eq!(
            map_status("p", 502, "Bad Gateway\n"),
            MarketError::UpstreamServerError { code: 502, message: "Bad Gateway".into() }
        );
    }

    #[tokio::test]
    async fn test_rate_limiter_allows_burst_within_budget() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(200));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_send_json_decodes_and_maps_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value":7}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let http = HttpClient::unthrottled("test");
        let ok: serde_json::Value = http
            .send_json(http.get(&format!("{}/ok", server.uri())))
            .await
            .unwrap();
        assert_eq!(ok["value"], 7);

        let garbled = http
            .send_json::<serde_json::Value>(http.get(&format!("{}/garbled", server.uri())))
            .await
            .unwrap_err();
        assert_eq!(garbled.kind(), ErrorKind::MalformedUpstreamResponse);

        let limited = http
            .send_json::<serde_json::Value>(http.get(&format!("{}/limited", server.uri())))
            .await
            .unwrap_err();
        assert_eq!(limited, MarketError::UpstreamRateLimited("test".into()));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let http = HttpClient::unthrottled("test");
        let err = http
            .send_text(http.get("http://127.0.0.1:9/nothing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
    }
}
