use std::path::Path;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

use super::{generate_join_code, load_class, Stored};
use crate::auth::AppUser;
use crate::db::models::{
    AttendanceRecord, Classroom, LectureSession, LessonSummary, ProcessingStatus, Role,
    UserProfile,
};
use crate::db::{Collection, Database, Direction, Document, Query, Subscription};
use crate::error::{MonitorError, MonitorResult};
use crate::services::LessonsClient;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const JOIN_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledStudent {
    pub uid: String,
    pub full_name: Option<String>,
}

pub struct TeacherDesk {
    db: Database,
    user: AppUser,
}

impl TeacherDesk {
    pub fn new(db: Database, user: AppUser) -> MonitorResult<Self> {
        user.require(Role::Teacher)?;
        Ok(Self { db, user })
    }

    pub fn user(&self) -> &AppUser {
        &self.user
    }

    /// Loads a class this teacher owns.
    pub async fn class(&self, class_id: &str) -> MonitorResult<Classroom> {
        let class = load_class(&self.db, class_id).await?;
        if class.teacher_id != self.user.uid() {
            return Err(MonitorError::Auth(format!(
                "class {class_id} belongs to another teacher"
            )));
        }
        Ok(class)
    }

    pub async fn create_class(&self, class_name: &str) -> MonitorResult<Stored<Classroom>> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(MonitorError::InvalidInput("class name is required".into()));
        }

        let mut join_code = None;
        for _ in 0..JOIN_CODE_ATTEMPTS {
            let candidate = generate_join_code(&mut rand::thread_rng());
            let taken = self
                .db
                .query(&Query::new(Collection::Classes).where_eq("joinCode", candidate.as_str()))
                .await?;
            if taken.is_empty() {
                join_code = Some(candidate);
                break;
            }
        }
        let join_code = join_code.ok_or_else(|| {
            MonitorError::Storage("could not allocate an unused join code".into())
        })?;

        let class = Classroom {
            class_name: class_name.to_string(),
            teacher_id: self.user.uid().to_string(),
            teacher_name: self.user.display_name().map(str::to_string),
            student_ids: Vec::new(),
            join_code,
            created_at: Utc::now(),
        };
        let id = self.db.create(Collection::Classes, &class).await?;
        log_info!("Created class {id} ({}) with join code {}", class.class_name, class.join_code);
        Ok(Stored { id, value: class })
    }

    fn classes_query(&self) -> Query {
        Query::new(Collection::Classes)
            .where_eq("teacherId", self.user.uid())
            .order_by("createdAt", Direction::Descending)
    }

    pub async fn classes(&self) -> MonitorResult<Vec<Stored<Classroom>>> {
        let classes = self.db.query_as::<Classroom>(&self.classes_query()).await?;
        Ok(classes.into_iter().map(Stored::from).collect())
    }

    pub fn watch_classes<F>(&self, on_data: F) -> Subscription
    where
        F: Fn(Vec<Document>) + Send + Sync + 'static,
    {
        self.db.subscribe(self.classes_query(), on_data, |err| {
            log_warn!("class listener failed: {err}");
        })
    }

    /// Enrolled students with their profile names, in enrolment order.
    pub async fn roster(&self, class_id: &str) -> MonitorResult<Vec<EnrolledStudent>> {
        let class = self.class(class_id).await?;
        let mut roster = Vec::with_capacity(class.student_ids.len());
        for uid in class.student_ids {
            let profile = self
                .db
                .get_as::<UserProfile>(Collection::Users, &uid)
                .await?;
            roster.push(EnrolledStudent {
                full_name: profile.and_then(|p| p.full_name),
                uid,
            });
        }
        Ok(roster)
    }

    pub async fn add_summary(
        &self,
        class_id: &str,
        title: &str,
        content: &str,
    ) -> MonitorResult<Stored<LessonSummary>> {
        self.class(class_id).await?;
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(MonitorError::InvalidInput(
                "summary title and content are required".into(),
            ));
        }
        let summary = LessonSummary {
            title: title.trim().to_string(),
            content: content.to_string(),
            class_id: class_id.to_string(),
            teacher_id: self.user.uid().to_string(),
            created_at: Utc::now(),
        };
        let id = self.db.create(Collection::Summaries, &summary).await?;
        Ok(Stored { id, value: summary })
    }

    pub async fn summaries(&self, class_id: &str) -> MonitorResult<Vec<Stored<LessonSummary>>> {
        self.class(class_id).await?;
        let query = Query::new(Collection::Summaries)
            .where_eq("classId", class_id)
            .order_by("createdAt", Direction::Descending);
        let summaries = self.db.query_as::<LessonSummary>(&query).await?;
        Ok(summaries.into_iter().map(Stored::from).collect())
    }

    pub async fn create_lecture_session(
        &self,
        class_id: &str,
        session_name: &str,
    ) -> MonitorResult<Stored<LectureSession>> {
        self.class(class_id).await?;
        let session_name = session_name.trim();
        if session_name.is_empty() {
            return Err(MonitorError::InvalidInput("session name is required".into()));
        }

        let now = Utc::now();
        let session = LectureSession {
            session_id: format!("{class_id}_session_{}", now.timestamp_millis()),
            session_name: session_name.to_string(),
            class_id: class_id.to_string(),
            teacher_id: self.user.uid().to_string(),
            start_time: now,
            end_time: None,
            processing_status: ProcessingStatus::Pending,
            audio_processed: false,
            transcript_id: None,
            summary_id: None,
            quiz_id: None,
        };
        let id = self.db.create(Collection::Sessions, &session).await?;
        Ok(Stored { id, value: session })
    }

    /// Lecture sessions of a class, newest first.
    pub async fn lecture_sessions(&self, class_id: &str) -> MonitorResult<Vec<Stored<LectureSession>>> {
        self.class(class_id).await?;
        lecture_sessions(&self.db, class_id).await
    }

    /// Uploads the lecture recording and records the outcome on the session
    /// document (`processing`, then `completed` or `failed`).
    pub async fn process_lecture_audio(
        &self,
        lessons: &LessonsClient,
        session_doc_id: &str,
        audio: &Path,
    ) -> MonitorResult<LectureSession> {
        let session = self
            .db
            .get_as::<LectureSession>(Collection::Sessions, session_doc_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("session {session_doc_id}")))?;
        self.class(&session.class_id).await?;

        self.db
            .update(
                Collection::Sessions,
                session_doc_id,
                json!({"processingStatus": ProcessingStatus::Processing}),
            )
            .await?;

        match lessons
            .process_audio(&session.session_id, &session.class_id, audio)
            .await
        {
            Ok(processed) => {
                self.db
                    .update(
                        Collection::Sessions,
                        session_doc_id,
                        json!({
                            "audioProcessed": true,
                            "processingStatus": ProcessingStatus::Completed,
                            "endTime": Utc::now(),
                            "transcriptId": processed.transcript_id,
                            "summaryId": processed.summary_id,
                            "quizId": processed.quiz_id,
                        }),
                    )
                    .await?;
                log_info!("Processed lecture audio for {}", session.session_id);
            }
            Err(err) => {
                log_warn!("Lecture audio processing failed for {}: {err}", session.session_id);
                self.db
                    .update(
                        Collection::Sessions,
                        session_doc_id,
                        json!({"processingStatus": ProcessingStatus::Failed}),
                    )
                    .await?;
                return Err(err);
            }
        }

        self.db
            .get_as::<LectureSession>(Collection::Sessions, session_doc_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("session {session_doc_id}")))
    }

    pub async fn attendance_on(
        &self,
        class_id: &str,
        date: NaiveDate,
    ) -> MonitorResult<Vec<AttendanceRecord>> {
        self.class(class_id).await?;
        let query = Query::new(Collection::Attendance)
            .where_eq("classId", class_id)
            .where_eq("date", date.format("%Y-%m-%d").to_string())
            .order_by("studentId", Direction::Ascending);
        let records = self.db.query_as::<AttendanceRecord>(&query).await?;
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }
}

pub(crate) async fn lecture_sessions(
    db: &Database,
    class_id: &str,
) -> MonitorResult<Vec<Stored<LectureSession>>> {
    let query = Query::new(Collection::Sessions)
        .where_eq("classId", class_id)
        .order_by("startTime", Direction::Descending);
    let sessions = db.query_as::<LectureSession>(&query).await?;
    Ok(sessions.into_iter().map(Stored::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::test_support::Campus;
    use crate::services::test_server;
    use axum::{routing::post, Json, Router};
    use std::time::Duration;

    async fn teacher(campus: &Campus) -> TeacherDesk {
        let user = campus.enroll("t@school.edu", "Ms. Teach", Role::Teacher).await;
        TeacherDesk::new(campus.db.clone(), user).unwrap()
    }

    #[tokio::test]
    async fn students_cannot_open_teacher_desk() {
        let campus = Campus::new();
        let student = campus.enroll("s@school.edu", "Sam", Role::Student).await;
        assert!(matches!(
            TeacherDesk::new(campus.db.clone(), student),
            Err(MonitorError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn create_class_and_list_newest_first() {
        let campus = Campus::new();
        let desk = teacher(&campus).await;

        let first = desk.create_class("Biology").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = desk.create_class("Chemistry").await.unwrap();
        assert_eq!(first.value.join_code.len(), 6);
        assert_eq!(first.value.teacher_name.as_deref(), Some("Ms. Teach"));

        let classes = desk.classes().await.unwrap();
        let ids: Vec<_> = classes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

        assert!(matches!(
            desk.create_class("   ").await,
            Err(MonitorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn roster_resolves_profile_names() {
        let campus = Campus::new();
        let desk = teacher(&campus).await;
        let class = desk.create_class("Biology").await.unwrap();

        campus
            .db
            .set(
                Collection::Users,
                "s1",
                &UserProfile {
                    uid: "s1".into(),
                    email: None,
                    full_name: Some("Ada Lovelace".into()),
                    role: Role::Student,
                },
                false,
            )
            .await
            .unwrap();
        campus
            .db
            .update(Collection::Classes, &class.id, json!({"studentIds": ["s1", "ghost"]}))
            .await
            .unwrap();

        let roster = desk.roster(&class.id).await.unwrap();
        assert_eq!(
            roster,
            vec![
                EnrolledStudent {
                    uid: "s1".into(),
                    full_name: Some("Ada Lovelace".into())
                },
                EnrolledStudent {
                    uid: "ghost".into(),
                    full_name: None
                },
            ]
        );
        assert!(matches!(
            desk.roster("missing").await,
            Err(MonitorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lecture_sessions_sorted_newest_first() {
        let campus = Campus::new();
        let desk = teacher(&campus).await;
        let class = desk.create_class("Physics").await.unwrap();

        let older = desk.create_lecture_session(&class.id, "Kinematics").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = desk.create_lecture_session(&class.id, "Forces").await.unwrap();
        assert!(older.value.session_id.starts_with(&format!("{}_session_", class.id)));
        assert_eq!(older.value.processing_status, ProcessingStatus::Pending);

        let sessions = desk.lecture_sessions(&class.id).await.unwrap();
        let names: Vec<_> = sessions.iter().map(|s| s.value.session_name.as_str()).collect();
        assert_eq!(names, vec!["Forces", "Kinematics"]);
        assert_eq!(sessions[0].id, newer.id);
    }

    #[tokio::test]
    async fn audio_processing_records_outcome() {
        let campus = Campus::new();
        let desk = teacher(&campus).await;
        let class = desk.create_class("History").await.unwrap();
        let session = desk.create_lecture_session(&class.id, "Rome").await.unwrap();

        let router = Router::new().route(
            "/process-session-audio",
            post(|| async {
                Json(serde_json::json!({
                    "transcriptId": "tr-1",
                    "summaryId": "su-1",
                    "quizId": "qz-1",
                    "processingStatus": "completed"
                }))
            }),
        );
        let base = test_server::spawn(router).await;
        let lessons = LessonsClient::new(base, Duration::from_secs(5)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("lecture.mp3");
        std::fs::write(&audio, b"ID3fake").unwrap();

        let updated = desk
            .process_lecture_audio(&lessons, &session.id, &audio)
            .await
            .unwrap();
        assert_eq!(updated.processing_status, ProcessingStatus::Completed);
        assert!(updated.audio_processed);
        assert_eq!(updated.quiz_id.as_deref(), Some("qz-1"));

        let bad = dir.path().join("notes.txt");
        std::fs::write(&bad, b"text").unwrap();
        assert!(desk.process_lecture_audio(&lessons, &session.id, &bad).await.is_err());
        let failed = campus
            .db
            .get_as::<LectureSession>(Collection::Sessions, &session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    }
}
