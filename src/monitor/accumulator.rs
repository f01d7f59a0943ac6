use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::recognition::{BoundingBox, RecognizedFace};
use crate::services::violence::{DetectionLabel, DetectionResponse, DetectionStatus};

pub const ALERT_HISTORY_LIMIT: usize = 10;

/// Folds per-poll responses into session results.
pub trait ResultAccumulator: Default + Send + 'static {
    type Response: Send + 'static;
    type Snapshot: Clone + std::fmt::Debug + Serialize + Send + 'static;

    /// Whether `response` carries a usable result. Rejected responses are
    /// neither merged nor counted as processed frames.
    fn accepts(&self, _response: &Self::Response) -> bool {
        true
    }

    /// Merges one response. Returns a replacement status line, if any.
    fn merge(&mut self, response: Self::Response, at: DateTime<Utc>) -> Option<String>;

    fn snapshot(&self) -> Self::Snapshot;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    pub identity: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub best_confidence: f32,
    pub sightings: u32,
    pub last_box: Option<BoundingBox>,
}

/// Identities seen at least once this session. Only ever grows.
#[derive(Debug, Default)]
pub struct AttendanceRoster {
    seen: BTreeMap<String, Sighting>,
}

impl AttendanceRoster {
    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains_key(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.seen.keys().map(String::as_str)
    }
}

fn is_unknown(identity: &str) -> bool {
    let identity = identity.trim();
    identity.is_empty() || identity.eq_ignore_ascii_case("unknown")
}

impl ResultAccumulator for AttendanceRoster {
    type Response = Vec<RecognizedFace>;
    type Snapshot = Vec<Sighting>;

    fn merge(&mut self, faces: Vec<RecognizedFace>, at: DateTime<Utc>) -> Option<String> {
        for face in faces.into_iter().filter(|face| !is_unknown(&face.identity)) {
            let identity = face.identity.trim().to_string();
            let entry = self.seen.entry(identity.clone()).or_insert_with(|| Sighting {
                identity,
                first_seen: at,
                last_seen: at,
                best_confidence: face.confidence,
                sightings: 0,
                last_box: None,
            });
            entry.last_seen = at;
            entry.best_confidence = entry.best_confidence.max(face.confidence);
            entry.sightings = entry.sightings.saturating_add(1);
            if face.bounding_box.is_some() {
                entry.last_box = face.bounding_box;
            }
        }
        None
    }

    fn snapshot(&self) -> Vec<Sighting> {
        self.seen.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub label: DetectionLabel,
    pub probability: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViolenceSnapshot {
    /// Positive detections, most recent first.
    pub alerts: Vec<DetectionResult>,
    pub latest: Option<DetectionResult>,
    pub frames_analyzed: u64,
}

/// Rolling window of positive detections plus the latest verdict.
#[derive(Debug, Default)]
pub struct AlertHistory {
    alerts: VecDeque<DetectionResult>,
    latest: Option<DetectionResult>,
    frames_analyzed: u64,
}

impl AlertHistory {
    pub fn latest(&self) -> Option<&DetectionResult> {
        self.latest.as_ref()
    }

    /// Frames the classifier produced a verdict for.
    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }
}

impl ResultAccumulator for AlertHistory {
    type Response = DetectionResponse;
    type Snapshot = ViolenceSnapshot;

    fn accepts(&self, response: &DetectionResponse) -> bool {
        match response.status {
            DetectionStatus::Success => response.label().is_some(),
            DetectionStatus::Waiting => true,
            DetectionStatus::Error | DetectionStatus::Unknown => false,
        }
    }

    fn merge(&mut self, response: DetectionResponse, at: DateTime<Utc>) -> Option<String> {
        match response.status {
            DetectionStatus::Success => {
                let label = response.label()?;
                let result = DetectionResult {
                    label,
                    probability: response.probability(),
                    timestamp: at,
                };
                self.latest = Some(result);
                self.frames_analyzed += 1;
                if label == DetectionLabel::Positive {
                    self.alerts.push_front(result);
                    self.alerts.truncate(ALERT_HISTORY_LIMIT);
                }
                Some("Analyzing...".to_string())
            }
            DetectionStatus::Waiting => Some(
                response
                    .message
                    .unwrap_or_else(|| "Collecting frames...".to_string()),
            ),
            DetectionStatus::Error | DetectionStatus::Unknown => None,
        }
    }

    fn snapshot(&self) -> ViolenceSnapshot {
        ViolenceSnapshot {
            alerts: self.alerts.iter().copied().collect(),
            latest: self.latest,
            frames_analyzed: self.frames_analyzed,
        }
    }

    fn len(&self) -> usize {
        self.alerts.len()
    }
}
