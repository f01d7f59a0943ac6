use serde::Serialize;

use super::{StudentDesk, TeacherDesk};
use crate::auth::AppUser;
use crate::db::models::{Classroom, Role};
use crate::db::Database;
use crate::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassCard {
    pub id: String,
    pub class_name: String,
    pub teacher_name: Option<String>,
    pub student_count: usize,
    /// Only shown to the owning teacher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
}

impl ClassCard {
    fn new(id: String, class: Classroom, show_code: bool) -> Self {
        Self {
            id,
            student_count: class.student_ids.len(),
            join_code: show_code.then_some(class.join_code),
            class_name: class.class_name,
            teacher_name: class.teacher_name,
        }
    }
}

/// Landing view for a signed-in user.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Teacher { user: AppUser, classes: Vec<ClassCard> },
    Student { user: AppUser, classes: Vec<ClassCard> },
}

impl Dashboard {
    pub async fn load(db: &Database, user: AppUser) -> MonitorResult<Self> {
        match user.role() {
            Some(Role::Teacher) => {
                let desk = TeacherDesk::new(db.clone(), user)?;
                let classes = desk
                    .classes()
                    .await?
                    .into_iter()
                    .map(|stored| ClassCard::new(stored.id, stored.value, true))
                    .collect();
                Ok(Dashboard::Teacher {
                    user: desk.user().clone(),
                    classes,
                })
            }
            Some(Role::Student) => {
                let desk = StudentDesk::new(db.clone(), user)?;
                let classes = desk
                    .classes()
                    .await?
                    .into_iter()
                    .map(|stored| ClassCard::new(stored.id, stored.value, false))
                    .collect();
                Ok(Dashboard::Student {
                    user: desk.user().clone(),
                    classes,
                })
            }
            None => Err(MonitorError::Auth(
                "choose a role before opening the dashboard".into(),
            )),
        }
    }

    pub fn classes(&self) -> &[ClassCard] {
        match self {
            Dashboard::Teacher { classes, .. } | Dashboard::Student { classes, .. } => classes,
        }
    }
}
