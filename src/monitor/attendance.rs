//! Live attendance: recognized faces polled every few seconds and folded into
//! a roster of everyone seen during the session.

use std::sync::Arc;

use async_trait::async_trait;

use super::accumulator::{AttendanceRoster, ResultAccumulator};
use super::backend::InferenceBackend;
use super::controller::{CaptureConfig, SessionController};
use crate::camera::{CameraProvider, EncodedFrame};
use crate::error::MonitorResult;
use crate::services::recognition::{RecognitionClient, StopSummary};

pub type AttendanceMonitor = SessionController<RecognitionClient>;

#[async_trait]
impl InferenceBackend for RecognitionClient {
    type Accumulator = AttendanceRoster;
    type Summary = StopSummary;

    fn name(&self) -> &'static str {
        "attendance"
    }

    fn busy_message(&self) -> &'static str {
        "Recognizing..."
    }

    async fn begin_session(&self, class_id: &str) -> MonitorResult<()> {
        self.start_session(class_id).await
    }

    async fn infer(
        &self,
        frame: &EncodedFrame,
        class_id: &str,
    ) -> MonitorResult<<AttendanceRoster as ResultAccumulator>::Response> {
        Ok(self.recognize(frame, class_id).await?.into_faces())
    }

    async fn finish_session(&self, class_id: &str) -> MonitorResult<StopSummary> {
        self.stop_session(class_id).await
    }
}

impl AttendanceMonitor {
    pub fn attendance(
        client: RecognitionClient,
        camera: Arc<dyn CameraProvider>,
        config: CaptureConfig,
    ) -> Self {
        SessionController::new(client, camera, config)
    }
}
