use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use classsphere_lib::camera::{CameraProvider, EncodedFrame, FrameSpec, VideoSource};
use classsphere_lib::monitor::{
    AlertHistory, AttendanceRoster, CaptureConfig, InferenceBackend, ResultAccumulator,
    SessionController, SessionPhase, TickOutcome,
};
use classsphere_lib::services::recognition::RecognizedFace;
use classsphere_lib::services::violence::DetectionResponse;
use classsphere_lib::{MonitorError, MonitorResult};
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::json;

struct StillSource {
    releases: Arc<AtomicUsize>,
}

impl VideoSource for StillSource {
    fn current_frame(&self) -> Option<DynamicImage> {
        Some(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            32,
            24,
            Rgb([40, 90, 160]),
        )))
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn label(&self) -> String {
        "still".into()
    }
}

#[derive(Default)]
struct StillCamera {
    releases: Arc<AtomicUsize>,
}

#[async_trait]
impl CameraProvider for StillCamera {
    async fn acquire(&self) -> MonitorResult<Arc<dyn VideoSource>> {
        Ok(Arc::new(StillSource {
            releases: self.releases.clone(),
        }))
    }
}

/// Plays back canned responses; repeats the last one when the script runs out.
struct Scripted<A: ResultAccumulator> {
    name: &'static str,
    script: Mutex<VecDeque<MonitorResult<A::Response>>>,
    finishes: AtomicUsize,
}

impl<A: ResultAccumulator> Scripted<A>
where
    A::Response: Clone,
{
    fn new(name: &'static str, script: Vec<MonitorResult<A::Response>>) -> Self {
        Self {
            name,
            script: Mutex::new(script.into()),
            finishes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<A> InferenceBackend for Scripted<A>
where
    A: ResultAccumulator + Sync,
    A::Response: Clone + Sync,
{
    type Accumulator = A;
    type Summary = String;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn begin_session(&self, _class_id: &str) -> MonitorResult<()> {
        Ok(())
    }

    async fn infer(&self, frame: &EncodedFrame, _class_id: &str) -> MonitorResult<A::Response> {
        assert_eq!((frame.width, frame.height), (64, 48));
        let mut script = self.script.lock().unwrap();
        match script.len() {
            0 => Err(MonitorError::Network("script exhausted".into())),
            1 => match &script[0] {
                Ok(response) => Ok(response.clone()),
                Err(_) => Err(MonitorError::Network("scripted failure".into())),
            },
            _ => script.pop_front().unwrap(),
        }
    }

    async fn finish_session(&self, class_id: &str) -> MonitorResult<String> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        Ok(format!("closed {class_id}"))
    }
}

fn config(interval: Duration) -> CaptureConfig {
    CaptureConfig {
        interval,
        frame: FrameSpec {
            width: 64,
            height: 48,
            jpeg_quality: 70,
        },
        request_timeout: Duration::from_secs(5),
        skip_when_busy: false,
    }
}

fn faces(ids: &[&str]) -> Vec<RecognizedFace> {
    ids.iter()
        .map(|id| RecognizedFace {
            identity: id.to_string(),
            confidence: 0.9,
            bounding_box: None,
        })
        .collect()
}

fn detection(value: serde_json::Value) -> DetectionResponse {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn attendance_session_collects_union_and_releases_camera() {
    let camera = Arc::new(StillCamera::default());
    let releases = camera.releases.clone();
    let backend = Scripted::<AttendanceRoster>::new(
        "attendance",
        vec![
            Ok(faces(&["ada", "ben"])),
            Err(MonitorError::Network("flaky".into())),
            Ok(faces(&["unknown", "cy"])),
            Ok(faces(&["ben"])),
        ],
    );
    let monitor = SessionController::new(backend, camera, config(Duration::from_secs(3600)));

    let session = monitor.start("bio-101").await.unwrap().unwrap();
    assert_eq!(session.class_id, "bio-101");
    assert_eq!(monitor.phase().await, SessionPhase::Active);

    assert_eq!(monitor.tick_now().await, TickOutcome::Merged);
    assert_eq!(monitor.tick_now().await, TickOutcome::Failed);
    assert_eq!(monitor.tick_now().await, TickOutcome::Merged);
    assert_eq!(monitor.tick_now().await, TickOutcome::Merged);

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.result_count, 3);

    let report = monitor.stop().await.unwrap();
    let seen: Vec<_> = report.results.iter().map(|s| s.identity.as_str()).collect();
    assert_eq!(seen, vec!["ada", "ben", "cy"]);
    assert_eq!(report.summary.as_deref(), Some("closed bio-101"));
    assert_eq!(monitor.backend().finishes.load(Ordering::SeqCst), 1);
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let cleared = monitor.snapshot().await;
    assert_eq!(cleared.phase, SessionPhase::Idle);
    assert_eq!(cleared.result_count, 0);
    assert_eq!(monitor.tick_now().await, TickOutcome::Inactive);
}

#[tokio::test]
async fn violence_session_keeps_positive_alerts_newest_first() {
    let camera = Arc::new(StillCamera::default());
    let backend = Scripted::<AlertHistory>::new(
        "violence",
        vec![
            Ok(detection(json!({"status": "waiting", "message": "Collecting frames... (4/16)"}))),
            Ok(detection(json!({"status": "success", "prediction": "Violence", "probability": 0.81}))),
            Ok(detection(json!({"status": "success", "prediction": "NonViolence", "probability": 0.12}))),
            Ok(detection(json!({"status": "success", "prediction": "Violence", "probability": 0.95}))),
        ],
    );
    let monitor = SessionController::new(backend, camera, config(Duration::from_secs(3600)));
    monitor.start("hall-2").await.unwrap();

    monitor.tick_now().await;
    assert_eq!(
        monitor.snapshot().await.status_message,
        "Collecting frames... (4/16)"
    );
    for _ in 0..3 {
        monitor.tick_now().await;
    }

    let report = monitor.stop().await.unwrap();
    let probabilities: Vec<f32> = report.results.alerts.iter().map(|a| a.probability).collect();
    assert_eq!(probabilities, vec![0.95, 0.81]);
    assert_eq!(report.results.frames_analyzed, 3);
}

#[tokio::test]
async fn timer_driven_session_polls_until_stopped() {
    let camera = Arc::new(StillCamera::default());
    let releases = camera.releases.clone();
    let backend =
        Scripted::<AttendanceRoster>::new("attendance", vec![Ok(faces(&["ada"]))]);
    let monitor = SessionController::new(backend, camera, config(Duration::from_millis(20)));

    monitor.start("chem").await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while monitor.snapshot().await.frames_processed < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("capture loop never ticked");

    let report = monitor.stop().await.unwrap();
    assert!(report.frames_processed >= 3);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].sightings as u64, report.frames_processed);

    let after_stop = monitor.snapshot().await.frames_processed;
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(monitor.snapshot().await.frames_processed, after_stop);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}
