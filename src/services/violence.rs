//! Client for the violence-classification service.
//!
//! The service buffers a short clip per class before it classifies; until
//! then `detect_frame` answers with a `waiting` status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::JsonClient;
use crate::camera::EncodedFrame;
use crate::error::MonitorResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolencePaths {
    pub detect_frame: String,
    pub reset_buffer: String,
}

impl Default for ViolencePaths {
    fn default() -> Self {
        Self {
            detect_frame: "/detect-frame".into(),
            reset_buffer: "/reset-buffer".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DetectionLabel {
    Positive,
    Negative,
}

impl DetectionLabel {
    pub fn from_prediction(prediction: &str) -> Self {
        match prediction.trim().to_ascii_lowercase().as_str() {
            "violence" | "violent" | "positive" => DetectionLabel::Positive,
            _ => DetectionLabel::Negative,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    Success,
    #[serde(alias = "collecting")]
    Waiting,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResponse {
    pub status: DetectionStatus,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub probability: Option<f32>,
    /// Boolean verdict some service builds send instead of `prediction`.
    #[serde(default)]
    pub violence: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "buffer_size")]
    pub buffer_size: Option<u32>,
}

impl DetectionResponse {
    pub fn label(&self) -> Option<DetectionLabel> {
        if let Some(prediction) = &self.prediction {
            return Some(DetectionLabel::from_prediction(prediction));
        }
        self.violence.map(|flag| {
            if flag {
                DetectionLabel::Positive
            } else {
                DetectionLabel::Negative
            }
        })
    }

    pub fn probability(&self) -> f32 {
        self.probability.unwrap_or(0.0).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetAck {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameRequest<'a> {
    image: &'a str,
    class_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassRequest<'a> {
    class_id: &'a str,
}

#[derive(Clone)]
pub struct ViolenceClient {
    http: JsonClient,
    paths: ViolencePaths,
}

impl ViolenceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, timeout)?,
            paths: ViolencePaths::default(),
        })
    }

    pub fn with_paths(mut self, paths: ViolencePaths) -> Self {
        self.paths = paths;
        self
    }

    pub async fn detect_frame(
        &self,
        frame: &EncodedFrame,
        class_id: &str,
    ) -> MonitorResult<DetectionResponse> {
        let image = frame.to_data_url();
        self.http
            .post(
                &self.paths.detect_frame,
                &FrameRequest {
                    image: &image,
                    class_id,
                },
            )
            .await
    }

    pub async fn reset_buffer(&self, class_id: &str) -> MonitorResult<ResetAck> {
        self.http
            .post(&self.paths.reset_buffer, &ClassRequest { class_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_server;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn maps_prediction_labels() {
        assert_eq!(DetectionLabel::from_prediction("Violence"), DetectionLabel::Positive);
        assert_eq!(DetectionLabel::from_prediction("positive"), DetectionLabel::Positive);
        assert_eq!(DetectionLabel::from_prediction("NonViolence"), DetectionLabel::Negative);
        assert_eq!(DetectionLabel::from_prediction("Negative"), DetectionLabel::Negative);
    }

    #[test]
    fn parses_waiting_and_boolean_verdicts() {
        let waiting: DetectionResponse = serde_json::from_value(json!({
            "status": "waiting",
            "message": "Collecting frames... (3/16)",
            "buffer_size": 3
        }))
        .unwrap();
        assert_eq!(waiting.status, DetectionStatus::Waiting);
        assert_eq!(waiting.buffer_size, Some(3));
        assert_eq!(waiting.label(), None);

        let verdict: DetectionResponse = serde_json::from_value(json!({
            "status": "success",
            "probability": 1.7,
            "violence": true
        }))
        .unwrap();
        assert_eq!(verdict.label(), Some(DetectionLabel::Positive));
        assert_eq!(verdict.probability(), 1.0);
    }

    #[test]
    fn unknown_status_does_not_fail_parsing() {
        let parsed: DetectionResponse =
            serde_json::from_value(json!({"status": "warming"})).unwrap();
        assert_eq!(parsed.status, DetectionStatus::Unknown);
    }

    #[tokio::test]
    async fn reset_buffer_posts_class_id() {
        let router = Router::new().route(
            "/reset-buffer",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(json!({"status": "success", "message": body["classId"]}))
            }),
        );
        let base = test_server::spawn(router).await;
        let client = ViolenceClient::new(base, Duration::from_secs(5)).unwrap();

        let ack = client.reset_buffer("room-3").await.unwrap();
        assert_eq!(ack.message.as_deref(), Some("room-3"));
    }
}
