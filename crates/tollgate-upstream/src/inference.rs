//! HTTP inference client.
//!
//! POSTs `{"system": .., "messages": [..]}` to `{base_url}{path}` with a
//! bearer credential and expects `{"text": ".."}` back. The pooled client
//! speaks HTTPS through rustls; each call runs under the configured timeout.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tollgate_core::config::InferenceConfig;
use tollgate_core::{BoxFuture, Inference, InferenceRequest, UpstreamError};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

#[derive(Debug, Clone)]
pub struct HttpInference {
    /// Present only when both a base URL and a credential are configured.
    client: Option<reqwest::Client>,
    endpoint: String,
    timeout: Duration,
}

impl HttpInference {
    pub fn from_config(config: &InferenceConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty());
        let api_key = config.api_key.as_deref().filter(|k| !k.is_empty());

        let endpoint = format!("{}{}", base_url.unwrap_or_default(), config.path);
        let client = match (base_url, api_key) {
            (Some(_), Some(key)) => match build_client(key, timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "inference client unavailable");
                    None
                }
            },
            _ => None,
        };

        Self {
            client,
            endpoint,
            timeout,
        }
    }

    async fn call(&self, request: InferenceRequest) -> Result<String, UpstreamError> {
        let Some(client) = &self.client else {
            return Err(UpstreamError::NotConfigured);
        };

        let result = async {
            let response = client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| self.map_reqwest_error(&e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(UpstreamError::Status(status.as_u16()));
            }

            let payload = response
                .bytes()
                .await
                .map_err(|e| self.map_reqwest_error(&e))?;
            let parsed: GenerateResponse = serde_json::from_slice(&payload)
                .map_err(|e| UpstreamError::Decode(e.to_string()))?;
            Ok(parsed.text)
        }
        .await;

        if let Err(e) = &result {
            debug!(error = %e, endpoint = %self.endpoint, "inference call failed");
        }
        result
    }

    fn map_reqwest_error(&self, error: &reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.timeout.as_millis() as u64)
        } else if error.is_decode() {
            UpstreamError::Decode(error.to_string())
        } else {
            UpstreamError::Transport(error.to_string())
        }
    }
}

fn build_client(api_key: &str, timeout: Duration) -> Result<reqwest::Client, String> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| "api key contains invalid header characters".to_string())?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(USER_AGENT, HeaderValue::from_static("tollgate/0.1"));

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

impl Inference for HttpInference {
    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn generate(&self, request: InferenceRequest) -> BoxFuture<'_, Result<String, UpstreamError>> {
        Box::pin(self.call(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::{Value, json};
    use tollgate_core::ChatMessage;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: Option<String>, timeout_secs: u64) -> HttpInference {
        HttpInference::from_config(&InferenceConfig {
            base_url,
            api_key: Some("k-123".to_string()),
            timeout_secs,
            ..InferenceConfig::default()
        })
    }

    fn request() -> InferenceRequest {
        InferenceRequest {
            system: "be brief".to_string(),
            messages: vec![ChatMessage::user("hello")],
        }
    }

    #[tokio::test]
    async fn unconfigured_client_refuses() {
        let c = HttpInference::from_config(&InferenceConfig::default());
        assert!(!c.is_configured());
        let err = c.generate(request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured));
    }

    #[tokio::test]
    async fn posts_request_and_reads_text() {
        let router = Router::new().route(
            "/v1/generate",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let text = format!("{} / {} / {}", auth, body["system"], body["messages"][0]["role"]);
                Json(json!({ "text": text }))
            }),
        );
        let c = client(Some(serve(router).await), 5);
        let text = c.generate(request()).await.unwrap();
        assert_eq!(text, r#"Bearer k-123 / "be brief" / "user""#);
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_ignored() {
        let router = Router::new().route(
            "/v1/generate",
            post(|| async { Json(json!({ "text": "ok" })) }),
        );
        let base = format!("{}/", serve(router).await);
        let text = client(Some(base), 5).generate(request()).await.unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn bad_api_key_leaves_client_unconfigured() {
        let c = HttpInference::from_config(&InferenceConfig {
            base_url: Some("https://models.example.com".to_string()),
            api_key: Some("bad\nkey".to_string()),
            ..InferenceConfig::default()
        });
        assert!(!c.is_configured());
        let err = c.generate(request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured));
    }

    #[tokio::test]
    async fn https_scheme_builds_a_client() {
        let c = client(Some("https://models.example.com".to_string()), 5);
        assert!(c.is_configured());
        assert_eq!(c.endpoint, "https://models.example.com/v1/generate");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let router = Router::new().route(
            "/v1/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let c = client(Some(serve(router).await), 5);
        let err = c.generate(request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(500)));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let router = Router::new().route("/v1/generate", post(|| async { "not json" }));
        let c = client(Some(serve(router).await), 5);
        let err = c.generate(request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let router = Router::new().route(
            "/v1/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Json(json!({ "text": "late" }))
            }),
        );
        let c = client(Some(serve(router).await), 1);
        let err = c.generate(request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout(1000)));
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = client(Some(format!("http://{addr}")), 5).generate(request()).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
