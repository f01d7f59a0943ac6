use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::accumulator::ResultAccumulator;
use super::backend::InferenceBackend;
use super::loop_worker::{capture_loop, perform_tick, SharedState, TickContext, TickOutcome};
use super::state::{CaptureSession, SessionPhase, SessionReport, SessionSnapshot, SessionState};
use crate::camera::{CameraGuard, CameraProvider, FrameSpec};
use crate::error::{MonitorError, MonitorResult};
use crate::settings::{CaptureSettings, ServiceEndpoints};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub type Results<B> = <<B as InferenceBackend>::Accumulator as ResultAccumulator>::Snapshot;

pub type MonitorSnapshot<B> = SessionSnapshot<Results<B>>;
pub type MonitorReport<B> = SessionReport<Results<B>, <B as InferenceBackend>::Summary>;

#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    pub interval: Duration,
    pub frame: FrameSpec,
    pub request_timeout: Duration,
    pub skip_when_busy: bool,
}

impl CaptureConfig {
    pub fn from_settings(capture: &CaptureSettings, services: &ServiceEndpoints) -> Self {
        Self {
            interval: Duration::from_millis(capture.interval_ms),
            frame: FrameSpec::from(capture),
            request_timeout: services.request_timeout(),
            skip_when_busy: capture.skip_when_busy,
        }
    }
}

struct ActiveRuntime<B: InferenceBackend> {
    ctx: Arc<TickContext<B>>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    camera: CameraGuard,
}

impl<B: InferenceBackend> Drop for ActiveRuntime<B> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        // `camera` drops after this body and releases the device.
    }
}

struct ControllerInner<B: InferenceBackend> {
    backend: Arc<B>,
    camera: Arc<dyn CameraProvider>,
    config: CaptureConfig,
    state: SharedState<B>,
    // Also serializes start/stop against each other.
    runtime: Mutex<Option<ActiveRuntime<B>>>,
}

impl<B: InferenceBackend> ControllerInner<B> {
    async fn stop_session(&self) -> Option<MonitorReport<B>> {
        let name = self.backend.name();
        let mut runtime_slot = self.runtime.lock().await;
        {
            let mut state = self.state.lock().await;
            if state.phase != SessionPhase::Active {
                log_debug!("{name} stop ignored, session is {:?}", state.phase);
                return None;
            }
            state.begin_stopping();
        }

        let finalize = match runtime_slot.take() {
            Some(mut runtime) => {
                runtime.cancel_token.cancel();
                if let Some(handle) = runtime.handle.take() {
                    if let Err(err) = handle.await {
                        log_warn!("{name} capture loop failed to join: {err}");
                    }
                }
                let class_id = runtime.ctx.session.class_id.clone();
                let result = self.backend.finish_session(&class_id).await;
                runtime.camera.release();
                result
            }
            None => Err(MonitorError::InvalidInput(
                "no capture loop was running".into(),
            )),
        };

        let mut state = self.state.lock().await;
        let finished = state.finish();
        let (summary, finalize_error) = match finalize {
            Ok(summary) => (Some(summary), None),
            Err(err) => {
                log_error!("{name} session finalization failed: {err}");
                (None, Some(err.to_string()))
            }
        };
        state.last_error = finalize_error.clone();

        let session = finished.session?;
        log_info!(
            "{name} session stopped for class {} after {} frames",
            session.class_id,
            finished.frames_processed
        );
        Some(SessionReport {
            session,
            stopped_at: Utc::now(),
            frames_processed: finished.frames_processed,
            results: finished.results,
            summary,
            finalize_error,
        })
    }
}

async fn begin_session<B: InferenceBackend>(backend: &B, class_id: &str) {
    if let Err(err) = backend.begin_session(class_id).await {
        log_warn!("{} begin_session failed for class {class_id}: {err}", backend.name());
    }
}

const START_CANCELLED: &str = "session start was cancelled";

/// Rolls a `Starting` session back to `Idle` unless disarmed.
struct PendingStart<A: ResultAccumulator> {
    state: Arc<Mutex<SessionState<A>>>,
    armed: bool,
}

impl<A: ResultAccumulator> PendingStart<A> {
    fn new(state: Arc<Mutex<SessionState<A>>>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

fn roll_back<A: ResultAccumulator>(state: &mut SessionState<A>) {
    if state.phase == SessionPhase::Starting {
        log_warn!("Session start abandoned before it completed");
        state.abort_start(START_CANCELLED);
    }
}

impl<A: ResultAccumulator> Drop for PendingStart<A> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.try_lock() {
            roll_back(&mut state);
            return;
        }
        let state = Arc::clone(&self.state);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { roll_back(&mut *state.lock().await) });
            }
            Err(_) => log_error!("Abandoned session start could not be rolled back"),
        }
    }
}

/// Drives one polling session at a time: camera acquisition, the capture
/// loop and the remote begin/finish calls.
///
/// Cloning is cheap and every clone controls the same session. Dropping the
/// last clone mid-session cancels the loop and releases the camera.
pub struct SessionController<B: InferenceBackend> {
    inner: Arc<ControllerInner<B>>,
}

impl<B: InferenceBackend> Clone for SessionController<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: InferenceBackend> SessionController<B> {
    pub fn new(backend: B, camera: Arc<dyn CameraProvider>, config: CaptureConfig) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                backend: Arc::new(backend),
                camera,
                config,
                state: Arc::new(Mutex::new(SessionState::new())),
                runtime: Mutex::new(None),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn config(&self) -> CaptureConfig {
        self.inner.config
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.state.lock().await.phase
    }

    pub async fn is_active(&self) -> bool {
        self.phase().await == SessionPhase::Active
    }

    pub async fn snapshot(&self) -> MonitorSnapshot<B> {
        self.inner.state.lock().await.snapshot()
    }

    /// Starts polling for `class_id`. Returns `Ok(None)` when a session is
    /// already running.
    ///
    /// Dropping the returned future before it resolves puts the monitor back
    /// to `Idle`.
    pub async fn start(&self, class_id: &str) -> MonitorResult<Option<CaptureSession>> {
        let class_id = class_id.trim();
        if class_id.is_empty() {
            return Err(MonitorError::InvalidInput("class id is required".into()));
        }

        let name = self.inner.backend.name();
        let mut runtime = self.inner.runtime.lock().await;
        {
            let mut state = self.inner.state.lock().await;
            if state.phase != SessionPhase::Idle {
                log_debug!("{name} start ignored, session is {:?}", state.phase);
                return Ok(None);
            }
            state.begin_starting();
        }
        let pending = PendingStart::new(Arc::clone(&self.inner.state));

        let source = match self.inner.camera.acquire().await {
            Ok(source) => source,
            Err(err) => {
                log_error!("{name} session start failed for class {class_id}: {err}");
                self.inner.state.lock().await.abort_start(&err.to_string());
                pending.disarm();
                return Err(err);
            }
        };
        let camera = CameraGuard::new(source);

        let backend = Arc::clone(&self.inner.backend);
        if backend.awaits_begin() {
            begin_session(&*backend, class_id).await;
        } else {
            let begin_class = class_id.to_string();
            tokio::spawn(async move { begin_session(&*backend, &begin_class).await });
        }

        let session = self.inner.state.lock().await.activate(
            class_id,
            Utc::now(),
            self.inner.backend.busy_message(),
        );
        pending.disarm();

        let config = self.inner.config;
        let ctx = Arc::new(TickContext::new(
            Arc::clone(&self.inner.backend),
            camera.source(),
            Arc::clone(&self.inner.state),
            session.clone(),
            config.frame,
            config.request_timeout,
        ));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            Arc::clone(&ctx),
            config.interval,
            config.skip_when_busy,
            cancel_token.clone(),
        ));

        let previous = runtime.replace(ActiveRuntime {
            ctx,
            cancel_token,
            handle: Some(handle),
            camera,
        });
        if previous.is_some() {
            log_warn!("{name} replaced an orphaned capture loop");
        }

        log_info!(
            "{name} session started for class {class_id} (generation {})",
            session.generation
        );
        Ok(Some(session))
    }

    /// Stops the running session and returns what it collected. A no-op
    /// returning `None` unless a session is active.
    ///
    /// Failure of the remote finish call does not abort teardown; it is
    /// recorded in the report and in the snapshot's `last_error`. Teardown
    /// runs on its own task and completes even if this future is dropped.
    pub async fn stop(&self) -> Option<MonitorReport<B>> {
        let inner = Arc::clone(&self.inner);
        match tokio::spawn(async move { inner.stop_session().await }).await {
            Ok(report) => report,
            Err(err) => {
                log_error!("{} session teardown failed: {err}", self.inner.backend.name());
                None
            }
        }
    }

    /// Runs one capture tick immediately, outside the timer.
    pub async fn tick_now(&self) -> TickOutcome {
        let ctx = match self.inner.runtime.lock().await.as_ref() {
            Some(runtime) => Arc::clone(&runtime.ctx),
            None => return TickOutcome::Inactive,
        };
        perform_tick(&ctx).await
    }
}
