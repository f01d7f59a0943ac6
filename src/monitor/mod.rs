//! Camera polling sessions.
//!
//! A [`SessionController`] owns one camera and one capture loop at a time.
//! Each tick snapshots a frame, posts it to an [`InferenceBackend`] and folds
//! the answer into the session's [`ResultAccumulator`]. Ticks that fail are
//! logged and skipped; only `start`/`stop` report errors to the caller.

pub mod accumulator;
pub mod attendance;
pub mod backend;
pub mod controller;
pub mod loop_worker;
pub mod state;
pub mod violence;

pub use accumulator::{
    AlertHistory, AttendanceRoster, DetectionResult, ResultAccumulator, Sighting,
    ViolenceSnapshot, ALERT_HISTORY_LIMIT,
};
pub use attendance::AttendanceMonitor;
pub use backend::InferenceBackend;
pub use controller::{CaptureConfig, MonitorReport, MonitorSnapshot, SessionController};
pub use loop_worker::TickOutcome;
pub use state::{Applied, CaptureSession, SessionPhase, SessionReport, SessionSnapshot};
pub use violence::ViolenceMonitor;
