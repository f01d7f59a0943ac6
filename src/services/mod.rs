pub mod lessons;
pub mod recognition;
pub mod violence;

pub use lessons::LessonsClient;
pub use recognition::RecognitionClient;
pub use violence::ViolenceClient;

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// JSON-over-HTTP plumbing shared by the service clients.
#[derive(Clone)]
pub(crate) struct JsonClient {
    client: Client,
    base_url: String,
}

impl JsonClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MonitorError::Network(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> MonitorResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }

    pub async fn post_multipart<T>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
        timeout: Duration,
    ) -> MonitorResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .timeout(timeout)
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get<T>(&self, path: &str) -> MonitorResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.client.get(self.url(path)).send().await?;
        decode(response).await
    }

    pub async fn get_with_query<T>(&self, path: &str, query: &[(&str, &str)]) -> MonitorResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> MonitorResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::NOT_FOUND {
        return Err(MonitorError::NotFound(error_message(&body)));
    }
    if !status.is_success() {
        return Err(MonitorError::Service {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    serde_json::from_str(&body)
        .map_err(|err| MonitorError::Network(format!("malformed response body: {err}")))
}

/// Pulls `error`/`message` out of a JSON error body, falling back to raw text.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| value.get("error").or_else(|| value.get("message")))
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::{json, Value};

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error":"Quiz not found"}"#), "Quiz not found");
        assert_eq!(error_message(r#"{"message":"busy"}"#), "busy");
        assert_eq!(error_message(" plain failure \n"), "plain failure");
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let client = JsonClient::new("http://host:1/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/recognize"), "http://host:1/recognize");
        assert_eq!(client.url("reset-buffer"), "http://host:1/reset-buffer");
    }

    #[tokio::test]
    async fn maps_statuses_to_error_taxonomy() {
        let router = Router::new()
            .route("/ok", get(|| async { Json(json!({"value": 7})) }))
            .route(
                "/missing",
                get(|| async { (AxumStatus::NOT_FOUND, Json(json!({"error": "Summary not found"}))) }),
            )
            .route(
                "/broken",
                get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "model crashed") }),
            );
        let base = test_server::spawn(router).await;
        let client = JsonClient::new(base, Duration::from_secs(5)).unwrap();

        let ok: Value = client.get("/ok").await.unwrap();
        assert_eq!(ok["value"], 7);

        match client.get::<Value>("/missing").await {
            Err(MonitorError::NotFound(message)) => assert_eq!(message, "Summary not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }

        match client.get::<Value>("/broken").await {
            Err(MonitorError::Service { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "model crashed");
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let client = JsonClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(matches!(
            client.get::<Value>("/anything").await,
            Err(MonitorError::Network(_))
        ));
    }
}
