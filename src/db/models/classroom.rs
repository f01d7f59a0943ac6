use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `classes/{id}` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub class_name: String,
    pub teacher_id: String,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
}

/// Teacher-written note shown to enrolled students. `summaries/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    pub title: String,
    pub content: String,
    pub class_id: String,
    pub teacher_id: String,
    pub created_at: DateTime<Utc>,
}
