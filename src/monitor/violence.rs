//! Violence detection: one frame per second streamed to a clip classifier,
//! positive verdicts kept in a short alert history.

use std::sync::Arc;

use async_trait::async_trait;

use super::accumulator::AlertHistory;
use super::backend::InferenceBackend;
use super::controller::{CaptureConfig, SessionController};
use crate::camera::{CameraProvider, EncodedFrame};
use crate::error::MonitorResult;
use crate::services::violence::{DetectionResponse, ResetAck, ViolenceClient};

pub type ViolenceMonitor = SessionController<ViolenceClient>;

#[async_trait]
impl InferenceBackend for ViolenceClient {
    type Accumulator = AlertHistory;
    type Summary = ResetAck;

    fn name(&self) -> &'static str {
        "violence"
    }

    fn busy_message(&self) -> &'static str {
        "Collecting frames..."
    }

    /// The reset must land before the first frame, or it would clear frames
    /// this session already buffered.
    fn awaits_begin(&self) -> bool {
        true
    }

    /// Clears frames buffered by an earlier session for this class.
    async fn begin_session(&self, class_id: &str) -> MonitorResult<()> {
        self.reset_buffer(class_id).await.map(|_| ())
    }

    async fn infer(&self, frame: &EncodedFrame, class_id: &str) -> MonitorResult<DetectionResponse> {
        self.detect_frame(frame, class_id).await
    }

    async fn finish_session(&self, class_id: &str) -> MonitorResult<ResetAck> {
        self.reset_buffer(class_id).await
    }
}

impl ViolenceMonitor {
    pub fn violence(
        client: ViolenceClient,
        camera: Arc<dyn CameraProvider>,
        config: CaptureConfig,
    ) -> Self {
        SessionController::new(client, camera, config)
    }
}
