use serde_json::json;

use super::teacher::lecture_sessions;
use super::{load_class, Stored, JOIN_CODE_LEN};
use crate::auth::AppUser;
use crate::db::models::{AttendanceRecord, Classroom, LectureSession, LessonSummary, Role};
use crate::db::{Collection, Database, Direction, Document, Query, Subscription};
use crate::error::{MonitorError, MonitorResult};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub struct StudentDesk {
    db: Database,
    user: AppUser,
}

impl StudentDesk {
    pub fn new(db: Database, user: AppUser) -> MonitorResult<Self> {
        user.require(Role::Student)?;
        Ok(Self { db, user })
    }

    pub fn user(&self) -> &AppUser {
        &self.user
    }

    /// Enrols the student in the class holding `code`. Codes are matched
    /// case-insensitively.
    pub async fn join_class(&self, code: &str) -> MonitorResult<Stored<Classroom>> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() != JOIN_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MonitorError::InvalidInput(format!(
                "join codes are {JOIN_CODE_LEN} letters or digits"
            )));
        }

        let query = Query::new(Collection::Classes)
            .where_eq("joinCode", code.as_str())
            .limit(1);
        let (class_id, mut class) = self
            .db
            .query_as::<Classroom>(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MonitorError::NotFound(format!("no class uses join code {code}")))?;

        let uid = self.user.uid();
        if class.student_ids.iter().any(|id| id == uid) {
            return Err(MonitorError::InvalidInput(format!(
                "already enrolled in {}",
                class.class_name
            )));
        }

        class.student_ids.push(uid.to_string());
        self.db
            .update(
                Collection::Classes,
                &class_id,
                json!({"studentIds": class.student_ids}),
            )
            .await?;

        log_info!("Student {uid} joined class {class_id}");
        Ok(Stored {
            id: class_id,
            value: class,
        })
    }

    fn classes_query(&self) -> Query {
        Query::new(Collection::Classes)
            .where_array_contains("studentIds", self.user.uid())
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

    /// Loads a class the student is enrolled in.
    pub async fn class(&self, class_id: &str) -> MonitorResult<Classroom> {
        let class = load_class(&self.db, class_id).await?;
        if !class.student_ids.iter().any(|id| id == self.user.uid()) {
            return Err(MonitorError::Auth(format!("not enrolled in class {class_id}")));
        }
        Ok(class)
    }

    /// Lesson summaries of an enrolled class, newest first.
    pub async fn summaries(&self, class_id: &str) -> MonitorResult<Vec<Stored<LessonSummary>>> {
        self.class(class_id).await?;
        let query = Query::new(Collection::Summaries)
            .where_eq("classId", class_id)
            .order_by("createdAt", Direction::Descending);
        let summaries = self.db.query_as::<LessonSummary>(&query).await?;
        Ok(summaries.into_iter().map(Stored::from).collect())
    }

    pub async fn lecture_sessions(&self, class_id: &str) -> MonitorResult<Vec<Stored<LectureSession>>> {
        self.class(class_id).await?;
        lecture_sessions(&self.db, class_id).await
    }

    /// The student's own attendance in one class, most recent day first.
    pub async fn attendance(&self, class_id: &str) -> MonitorResult<Vec<AttendanceRecord>> {
        let query = Query::new(Collection::Attendance)
            .where_eq("classId", class_id)
            .where_eq("studentId", self.user.uid())
            .order_by("date", Direction::Descending);
        let records = self.db.query_as::<AttendanceRecord>(&query).await?;
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }
}
