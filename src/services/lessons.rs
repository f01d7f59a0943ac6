//! Client for the transcription / summary / quiz service.

use std::{collections::BTreeMap, path::Path, time::Duration};

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use super::JsonClient;
use crate::error::{MonitorError, MonitorResult};

/// Transcription plus summarisation of a lecture recording takes minutes.
const AUDIO_PROCESSING_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummaryText {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question_id: String,
    #[serde(default)]
    pub question_text: String,
    /// Option letter → option text.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizData {
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub number_of_questions: Option<u32>,
}

impl QuizData {
    /// Question ids with no answer (or a blank one) in `answers`.
    pub fn unanswered<'a>(&'a self, answers: &BTreeMap<String, String>) -> Vec<&'a str> {
        self.questions
            .iter()
            .filter(|question| {
                answers
                    .get(&question.question_id)
                    .map(|answer| answer.trim().is_empty())
                    .unwrap_or(true)
            })
            .map(|question| question.question_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuiz {
    #[serde(default)]
    pub quiz_id: Option<String>,
    #[serde(default)]
    pub quiz_data: Option<QuizData>,
    #[serde(default)]
    pub number_of_questions: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSession {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub processing_status: Option<String>,
}

/// Everything the service holds for one lecture. Transcript and summary come
/// back as plain strings from cache or as records from storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureBundle {
    pub session: RemoteSession,
    #[serde(default)]
    pub transcript: Option<serde_json::Value>,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
    #[serde(default)]
    pub quiz: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub quiz_id: String,
    pub session_id: String,
    pub student_id: String,
    pub class_id: String,
    /// Question id → chosen option letter.
    pub answers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetail {
    pub question_id: String,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub student_answer: String,
    #[serde(default)]
    pub correct_answer: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    #[serde(default)]
    pub attempt_id: Option<String>,
    /// Percentage, 0-100.
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub answer_details: Vec<AnswerDetail>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    #[serde(default)]
    pub attempt_id: Option<String>,
    pub session_id: String,
    #[serde(default)]
    pub quiz_id: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub correct_answers: Option<u32>,
    #[serde(default)]
    pub total_questions: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptsEnvelope {
    #[serde(default)]
    attempts: Vec<QuizAttempt>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAudio {
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub summary_id: Option<String>,
    #[serde(default)]
    pub quiz_id: Option<String>,
    #[serde(default)]
    pub processing_status: Option<String>,
}

#[derive(Clone)]
pub struct LessonsClient {
    http: JsonClient,
}

impl LessonsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> MonitorResult<Self> {
        Ok(Self {
            http: JsonClient::new(base_url, timeout)?,
        })
    }

    pub async fn transcript(&self, session_id: &str) -> MonitorResult<Transcript> {
        self.http
            .get(&format!("/get-session-transcript/{session_id}"))
            .await
    }

    pub async fn summary(&self, session_id: &str) -> MonitorResult<LessonSummaryText> {
        self.http
            .get(&format!("/get-session-summary/{session_id}"))
            .await
    }

    /// Fails with `NotFound` when the service has no structured quiz yet.
    pub async fn quiz(&self, session_id: &str) -> MonitorResult<SessionQuiz> {
        let quiz: SessionQuiz = self
            .http
            .get(&format!("/get-session-quiz/{session_id}"))
            .await?;
        if quiz.quiz_data.is_none() {
            return Err(MonitorError::NotFound(format!(
                "quiz for session {session_id} has no questions"
            )));
        }
        Ok(quiz)
    }

    pub async fn session_data(&self, session_id: &str) -> MonitorResult<LectureBundle> {
        self.http
            .get(&format!("/get-session-data/{session_id}"))
            .await
    }

    pub async fn submit_quiz(&self, submission: &QuizSubmission) -> MonitorResult<QuizResult> {
        self.http.post("/submit-quiz", submission).await
    }

    pub async fn student_attempts(
        &self,
        student_id: &str,
        session_id: Option<&str>,
    ) -> MonitorResult<Vec<QuizAttempt>> {
        let path = format!("/get-student-attempts/{student_id}");
        let envelope: AttemptsEnvelope = match session_id {
            Some(session_id) => {
                self.http
                    .get_with_query(&path, &[("sessionId", session_id)])
                    .await?
            }
            None => self.http.get(&path).await?,
        };
        Ok(envelope.attempts)
    }

    /// Uploads a lecture recording for transcription, summary and quiz generation.
    pub async fn process_audio(
        &self,
        session_id: &str,
        class_id: &str,
        audio_path: &Path,
    ) -> MonitorResult<ProcessedAudio> {
        let mime = match audio_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            _ => {
                return Err(MonitorError::InvalidInput(format!(
                    "{} is not an MP3 or WAV recording",
                    audio_path.display()
                )))
            }
        };

        let bytes = tokio::fs::read(audio_path).await.map_err(|err| {
            MonitorError::InvalidInput(format!("cannot read {}: {err}", audio_path.display()))
        })?;
        let file_name = audio_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("lecture-audio")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|err| MonitorError::InvalidInput(err.to_string()))?;

        let form = Form::new()
            .text("sessionId", session_id.to_string())
            .text("classId", class_id.to_string())
            .part("file", part);

        self.http
            .post_multipart("/process-session-audio", form, AUDIO_PROCESSING_TIMEOUT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_server;
    use axum::{
        extract::{Path as AxumPath, Query},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn sample_quiz() -> QuizData {
        serde_json::from_value(json!({
            "questions": [
                {"questionId": "q1", "questionText": "2+2", "options": {"A": "3", "B": "4"}, "correctAnswer": "B"},
                {"questionId": "q2", "questionText": "Capital of France", "options": {"A": "Paris"}, "correctAnswer": "A"}
            ],
            "numberOfQuestions": 2
        }))
        .unwrap()
    }

    #[test]
    fn lists_unanswered_questions() {
        let quiz = sample_quiz();
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), "B".to_string());
        answers.insert("q2".to_string(), "  ".to_string());
        assert_eq!(quiz.unanswered(&answers), vec!["q2"]);
    }

    #[tokio::test]
    async fn missing_quiz_is_not_found() {
        let router = Router::new().route(
            "/get-session-quiz/:id",
            get(|AxumPath(id): AxumPath<String>| async move {
                if id == "s1" {
                    (StatusCode::OK, Json(json!({"success": true, "quizId": "qz", "quizData": null})))
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({"error": "Quiz not found"})))
                }
            }),
        );
        let base = test_server::spawn(router).await;
        let client = LessonsClient::new(base, Duration::from_secs(5)).unwrap();

        assert!(matches!(client.quiz("s1").await, Err(MonitorError::NotFound(_))));
        match client.quiz("nope").await {
            Err(MonitorError::NotFound(message)) => assert_eq!(message, "Quiz not found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submits_answers_and_reads_score() {
        let router = Router::new().route(
            "/submit-quiz",
            post(|Json(body): Json<Value>| async move {
                let correct = body["answers"]["q1"] == "B";
                Json(json!({
                    "success": true,
                    "attemptId": "att-1",
                    "score": if correct { 100.0 } else { 0.0 },
                    "correctAnswers": if correct { 1 } else { 0 },
                    "totalQuestions": 1,
                    "answerDetails": [{
                        "questionId": "q1",
                        "questionText": "2+2",
                        "studentAnswer": body["answers"]["q1"],
                        "correctAnswer": "B",
                        "isCorrect": correct
                    }]
                }))
            }),
        );
        let base = test_server::spawn(router).await;
        let client = LessonsClient::new(base, Duration::from_secs(5)).unwrap();

        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), "B".to_string());
        let result = client
            .submit_quiz(&QuizSubmission {
                quiz_id: "qz".into(),
                session_id: "s1".into(),
                student_id: "stu".into(),
                class_id: "c1".into(),
                answers,
                time_spent: Some(42),
            })
            .await
            .unwrap();

        assert_eq!(result.score, 100.0);
        assert_eq!(result.attempt_id.as_deref(), Some("att-1"));
        assert!(result.answer_details[0].is_correct);
    }

    #[tokio::test]
    async fn attempts_filter_by_session() {
        let router = Router::new().route(
            "/get-student-attempts/:student",
            get(
                |AxumPath(student): AxumPath<String>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    let session = params.get("sessionId").cloned().unwrap_or_else(|| "all".into());
                    Json(json!({
                        "success": true,
                        "studentId": student,
                        "attempts": [{"sessionId": session, "score": 50.0}],
                        "totalAttempts": 1
                    }))
                },
            ),
        );
        let base = test_server::spawn(router).await;
        let client = LessonsClient::new(base, Duration::from_secs(5)).unwrap();

        let scoped = client.student_attempts("stu", Some("s9")).await.unwrap();
        assert_eq!(scoped[0].session_id, "s9");
        let all = client.student_attempts("stu", None).await.unwrap();
        assert_eq!(all[0].session_id, "all");
    }

    #[tokio::test]
    async fn rejects_non_audio_upload() {
        let client = LessonsClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let result = client
            .process_audio("s1", "c1", Path::new("/tmp/lecture.txt"))
            .await;
        assert!(matches!(result, Err(MonitorError::InvalidInput(_))));
    }
}
