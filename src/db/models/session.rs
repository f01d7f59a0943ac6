use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Recorded lecture awaiting or holding transcript, summary and quiz.
/// `sessions/{id}`; `session_id` is the key the lessons service knows it by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LectureSession {
    pub session_id: String,
    pub session_name: String,
    pub class_id: String,
    pub teacher_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub audio_processed: bool,
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub summary_id: Option<String>,
    #[serde(default)]
    pub quiz_id: Option<String>,
}
