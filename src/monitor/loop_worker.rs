use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::backend::InferenceBackend;
use super::state::{Applied, CaptureSession, SessionState};
use crate::camera::{encode_frame, FrameSpec, VideoSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub type SharedState<B> =
    Arc<Mutex<SessionState<<B as InferenceBackend>::Accumulator>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session is running.
    Inactive,
    /// The video feed had no frame yet.
    NoFrame,
    Merged,
    /// The service answered without a usable result.
    Rejected,
    /// The session ended or restarted while the request was in flight.
    Stale,
    Failed,
}

/// Everything one capture tick needs, shared by every tick of a session.
pub(crate) struct TickContext<B: InferenceBackend> {
    pub backend: Arc<B>,
    pub source: Arc<dyn VideoSource>,
    pub state: SharedState<B>,
    pub session: CaptureSession,
    pub frame: FrameSpec,
    pub request_timeout: Duration,
    in_flight: AtomicUsize,
}

impl<B: InferenceBackend> TickContext<B> {
    pub fn new(
        backend: Arc<B>,
        source: Arc<dyn VideoSource>,
        state: SharedState<B>,
        session: CaptureSession,
        frame: FrameSpec,
        request_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            source,
            state,
            session,
            frame,
            request_timeout,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fires one tick per `interval` until cancelled. Ticks run as their own
/// tasks so a slow service never delays the next capture.
pub(crate) async fn capture_loop<B: InferenceBackend>(
    ctx: Arc<TickContext<B>>,
    interval: Duration,
    skip_when_busy: bool,
    cancel_token: CancellationToken,
) {
    let interval = interval.max(MIN_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!(
        "{} capture loop started for class {} (generation {}, every {}ms)",
        ctx.backend.name(),
        ctx.session.class_id,
        ctx.session.generation,
        interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if skip_when_busy && ctx.in_flight() > 0 {
                    log_debug!("{} tick skipped, previous request still in flight", ctx.backend.name());
                    continue;
                }
                let tick_ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    perform_tick(&tick_ctx).await;
                });
            }
            _ = cancel_token.cancelled() => {
                log_info!("{} capture loop shutting down", ctx.backend.name());
                break;
            }
        }
    }
}

/// Snapshot, encode, infer, merge. Errors are logged and reported through the
/// outcome; they never end the session.
pub(crate) async fn perform_tick<B: InferenceBackend>(ctx: &TickContext<B>) -> TickOutcome {
    let generation = ctx.session.generation;
    if !ctx.state.lock().await.is_current(generation) {
        return TickOutcome::Stale;
    }
    let _guard = InFlight::enter(&ctx.in_flight);

    // Frame grabs may hit the disk or a device driver.
    let source = Arc::clone(&ctx.source);
    let spec = ctx.frame;
    let captured = tokio::task::spawn_blocking(move || {
        source.current_frame().map(|frame| encode_frame(&frame, spec))
    })
    .await;
    let encoded = match captured {
        Ok(Some(Ok(encoded))) => encoded,
        Ok(None) => {
            log_debug!("{} tick skipped, no frame available yet", ctx.backend.name());
            return TickOutcome::NoFrame;
        }
        Ok(Some(Err(err))) => {
            log_warn!("{} tick dropped: {err}", ctx.backend.name());
            return TickOutcome::Failed;
        }
        Err(err) => {
            log_warn!("{} capture worker join failed: {err}", ctx.backend.name());
            return TickOutcome::Failed;
        }
    };

    let request = ctx.backend.infer(&encoded, &ctx.session.class_id);
    let response = match tokio::time::timeout(ctx.request_timeout, request).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            log_warn!(
                "{} request failed for class {}: {err}",
                ctx.backend.name(),
                ctx.session.class_id
            );
            return TickOutcome::Failed;
        }
        Err(_) => {
            log_warn!(
                "{} request timeout (> {}ms) for class {}",
                ctx.backend.name(),
                ctx.request_timeout.as_millis(),
                ctx.session.class_id
            );
            return TickOutcome::Failed;
        }
    };

    let mut state = ctx.state.lock().await;
    match state.apply(generation, response, Utc::now()) {
        Applied::Merged => TickOutcome::Merged,
        Applied::Rejected => {
            log_debug!("{} response carried no usable result", ctx.backend.name());
            TickOutcome::Rejected
        }
        Applied::Stale => {
            log_debug!(
                "{} discarded stale response for generation {}",
                ctx.backend.name(),
                generation
            );
            TickOutcome::Stale
        }
    }
}
