//! Client for the face-recognition attendance service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::JsonClient;
use crate::camera::EncodedFrame;
use crate::error::MonitorResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionPaths {
    pub start_session: String,
    pub recognize: String,
    pub stop_session: String,
}

impl Default for RecognitionPaths {
    fn default() -> Self {
        Self {
            start_session: "/start-session".into(),
            recognize: "/recognize".into(),
            stop_session: "/stop-session".into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassRequest<'a> {
    class_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameRequest<'a> {
    image: &'a str,
    class_id: &'a str,
}

/// Accepts both `{x, y, width, height}` objects and 4-element arrays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedFace {
    #[serde(default, alias = "name", alias = "uid")]
    pub identity: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default, alias = "bounding_box")]
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResponse {
    #[serde(default)]
    pub results: Vec<RecognizedFace>,
    /// Older service builds report a cumulative id list instead of `results`.
    #[serde(default, alias = "recognized_uids")]
    pub recognized_uids: Vec<String>,
}

impl RecognitionResponse {
    /// Per-face results with any bare id list folded in at full confidence.
    pub fn into_faces(self) -> Vec<RecognizedFace> {
        let mut faces = self.results;
        for uid in self.recognized_uids {
            if !faces.iter().any(|face| face.identity == uid) {
                faces.push(RecognizedFace {
                    identity: uid,
                    confidence: 1.0,
                    bounding_box: None,
                });
            }
        }
        faces
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StopSummary {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "present_students_uids")]
    pub present_students_uids: Vec<String>,
    #[serde(default, alias = "records_saved")]
    pub records_saved: Option<u32>,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
}

#[derive(Clone)]
pub struct RecognitionClient {
    http: JsonClient,
    paths: RecognitionPaths,
}

impl RecognitionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, timeout)?,
            paths: RecognitionPaths::default(),
        })
    }

    pub fn with_paths(mut self, paths: RecognitionPaths) -> Self {
        self.paths = paths;
        self
    }

    pub async fn start_session(&self, class_id: &str) -> MonitorResult<()> {
        let _: serde_json::Value = self
            .http
            .post(&self.paths.start_session, &ClassRequest { class_id })
            .await?;
        Ok(())
    }

    pub async fn recognize(
        &self,
        frame: &EncodedFrame,
        class_id: &str,
    ) -> MonitorResult<RecognitionResponse> {
        let image = frame.to_data_url();
        self.http
            .post(
                &self.paths.recognize,
                &FrameRequest {
                    image: &image,
                    class_id,
                },
            )
            .await
    }

    pub async fn stop_session(&self, class_id: &str) -> MonitorResult<StopSummary> {
        self.http
            .post(&self.paths.stop_session, &ClassRequest { class_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{encode_frame, FrameSpec};
    use crate::services::test_server;
    use axum::{routing::post, Json, Router};
    use image::{DynamicImage, RgbImage};
    use serde_json::{json, Value};

    #[test]
    fn parses_spec_shaped_results() {
        let body = json!({
            "results": [
                {"identity": "stu-1", "confidence": 0.91, "boundingBox": {"x": 1, "y": 2, "width": 30, "height": 40}},
                {"identity": "unknown", "confidence": 0.2, "boundingBox": [0, 0, 10, 10]}
            ]
        });
        let parsed: RecognitionResponse = serde_json::from_value(body).unwrap();
        let faces = parsed.into_faces();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].identity, "stu-1");
        assert_eq!(faces[0].bounding_box.unwrap().height, 40.0);
        assert_eq!(faces[1].bounding_box.unwrap().width, 10.0);
    }

    #[test]
    fn folds_legacy_uid_list_without_duplicates() {
        let body = json!({
            "message": "Frame processed.",
            "results": [{"name": "a"}],
            "recognized_uids": ["a", "b"]
        });
        let parsed: RecognitionResponse = serde_json::from_value(body).unwrap();
        let ids: Vec<String> = parsed.into_faces().into_iter().map(|f| f.identity).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn posts_frame_as_data_url_with_class_id() {
        let router = Router::new()
            .route(
                "/recognize",
                post(|Json(body): Json<Value>| async move {
                    let image = body["image"].as_str().unwrap_or_default();
                    let class_id = body["classId"].as_str().unwrap_or_default();
                    assert!(image.starts_with("data:image/jpeg;base64,"));
                    Json(json!({"results": [{"identity": class_id, "confidence": 0.8}]}))
                }),
            )
            .route(
                "/stop-session",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "message": "Session stopped and attendance recorded.",
                        "present_students_uids": [body["classId"]],
                    }))
                }),
            );
        let base = test_server::spawn(router).await;
        let client = RecognitionClient::new(base, Duration::from_secs(5)).unwrap();

        let frame = encode_frame(
            &DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
            FrameSpec::default(),
        )
        .unwrap();
        let response = client.recognize(&frame, "class-7").await.unwrap();
        assert_eq!(response.into_faces()[0].identity, "class-7");

        let summary = client.stop_session("class-7").await.unwrap();
        assert_eq!(summary.present_students_uids, vec!["class-7"]);
    }
}
