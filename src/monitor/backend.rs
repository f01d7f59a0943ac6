use async_trait::async_trait;
use serde::Serialize;

use super::accumulator::ResultAccumulator;
use crate::camera::EncodedFrame;
use crate::error::MonitorResult;

/// The remote half of a monitor: session bracketing calls plus the per-frame
/// inference request.
#[async_trait]
pub trait InferenceBackend: Send + Sync + 'static {
    type Accumulator: ResultAccumulator;
    type Summary: Clone + std::fmt::Debug + Serialize + Send + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Status line shown while the session is polling.
    fn busy_message(&self) -> &'static str {
        "Analyzing..."
    }

    /// Whether `begin_session` must complete before the first frame is sent.
    /// Otherwise it runs alongside polling.
    fn awaits_begin(&self) -> bool {
        false
    }

    /// Called once per session start. Failures are logged, never fatal.
    async fn begin_session(&self, class_id: &str) -> MonitorResult<()>;

    async fn infer(
        &self,
        frame: &EncodedFrame,
        class_id: &str,
    ) -> MonitorResult<<Self::Accumulator as ResultAccumulator>::Response>;

    /// Called once per session stop, after the capture loop has ended.
    async fn finish_session(&self, class_id: &str) -> MonitorResult<Self::Summary>;
}
