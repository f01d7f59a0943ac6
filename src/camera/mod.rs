pub mod frame;
pub mod still_sequence;

pub use frame::{encode_frame, EncodedFrame, FrameSpec};
pub use still_sequence::StillSequenceCamera;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::MonitorResult;

/// A live video feed the capture loop can snapshot.
pub trait VideoSource: Send + Sync {
    /// Latest decoded frame, or `None` while the feed has not produced one yet.
    fn current_frame(&self) -> Option<DynamicImage>;

    /// Stops the underlying device. Called once by [`CameraGuard`].
    fn release(&self);

    fn label(&self) -> String;
}

/// Hands out video sources. Acquisition fails with `MediaAccess` when the
/// device is missing or permission is denied.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn acquire(&self) -> MonitorResult<Arc<dyn VideoSource>>;
}

/// Scoped ownership of an acquired camera.
///
/// The hardware is released exactly once, either through [`CameraGuard::release`]
/// or when the guard is dropped.
pub struct CameraGuard {
    source: Arc<dyn VideoSource>,
    released: AtomicBool,
}

impl CameraGuard {
    pub fn new(source: Arc<dyn VideoSource>) -> Self {
        Self {
            source,
            released: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> Arc<dyn VideoSource> {
        Arc::clone(&self.source)
    }

    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            log::info!("Releasing camera {}", self.source.label());
            self.source.release();
        }
    }
}

impl Drop for CameraGuard {
    fn drop(&mut self) {
        self.release();
    }
}
