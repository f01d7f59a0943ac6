use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::accumulator::ResultAccumulator;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

/// One started session. `generation` is unique per controller and tags every
/// in-flight request so late responses can be recognised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub generation: u64,
    pub class_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot<S> {
    pub phase: SessionPhase,
    pub session: Option<CaptureSession>,
    pub results: S,
    pub result_count: usize,
    pub frames_processed: u64,
    pub status_message: String,
    pub last_error: Option<String>,
}

/// What a session produced, handed back by `stop()` before state is cleared.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport<S, M> {
    pub session: CaptureSession,
    pub stopped_at: DateTime<Utc>,
    pub frames_processed: u64,
    pub results: S,
    pub summary: Option<M>,
    pub finalize_error: Option<String>,
}

/// What became of a response handed to [`SessionState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Merged,
    /// The accumulator had no use for it.
    Rejected,
    /// It belongs to a session that is no longer active.
    Stale,
}

pub struct FinishedSession<S> {
    pub session: Option<CaptureSession>,
    pub results: S,
    pub frames_processed: u64,
}

/// UI-facing state of one monitor.
#[derive(Debug, Default)]
pub struct SessionState<A> {
    pub phase: SessionPhase,
    pub session: Option<CaptureSession>,
    pub results: A,
    pub frames_processed: u64,
    pub status_message: String,
    pub last_error: Option<String>,
    last_generation: u64,
}

impl<A: ResultAccumulator> SessionState<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_starting(&mut self) {
        self.phase = SessionPhase::Starting;
        self.status_message = "Starting session...".into();
        self.last_error = None;
    }

    pub fn abort_start(&mut self, reason: &str) {
        self.phase = SessionPhase::Idle;
        self.status_message.clear();
        self.last_error = Some(reason.to_string());
    }

    /// Enters `Active` with a fresh generation and empty results.
    pub fn activate(
        &mut self,
        class_id: &str,
        started_at: DateTime<Utc>,
        busy_message: &str,
    ) -> CaptureSession {
        self.last_generation += 1;
        let session = CaptureSession {
            generation: self.last_generation,
            class_id: class_id.to_string(),
            started_at,
        };

        self.phase = SessionPhase::Active;
        self.session = Some(session.clone());
        self.results = A::default();
        self.frames_processed = 0;
        self.status_message = busy_message.to_string();
        session
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.phase == SessionPhase::Active
            && self
                .session
                .as_ref()
                .map(|session| session.generation == generation)
                .unwrap_or(false)
    }

    /// Merges a response tagged with `generation`; stale responses are dropped.
    pub fn apply(&mut self, generation: u64, response: A::Response, at: DateTime<Utc>) -> Applied {
        if !self.is_current(generation) {
            return Applied::Stale;
        }
        if !self.results.accepts(&response) {
            return Applied::Rejected;
        }
        self.frames_processed += 1;
        if let Some(status) = self.results.merge(response, at) {
            self.status_message = status;
        }
        Applied::Merged
    }

    pub fn begin_stopping(&mut self) {
        self.phase = SessionPhase::Stopping;
        self.status_message = "Stopping session...".into();
    }

    /// Returns to `Idle`, handing back and clearing the accumulated results.
    pub fn finish(&mut self) -> FinishedSession<A::Snapshot> {
        let finished = FinishedSession {
            session: self.session.take(),
            results: self.results.snapshot(),
            frames_processed: self.frames_processed,
        };
        self.phase = SessionPhase::Idle;
        self.results = A::default();
        self.frames_processed = 0;
        self.status_message.clear();
        finished
    }

    pub fn snapshot(&self) -> SessionSnapshot<A::Snapshot> {
        SessionSnapshot {
            phase: self.phase,
            session: self.session.clone(),
            results: self.results.snapshot(),
            result_count: self.results.len(),
            frames_processed: self.frames_processed,
            status_message: self.status_message.clone(),
            last_error: self.last_error.clone(),
        }
    }
}
