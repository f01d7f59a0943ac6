//! Class management on top of the document store.
//!
//! [`TeacherDesk`] and [`StudentDesk`] are role-checked views for one
//! signed-in user; constructing one with the wrong role fails with `Auth`.

pub mod attendance;
pub mod dashboard;
pub mod student;
pub mod teacher;

pub use attendance::persist_attendance;
pub use dashboard::{ClassCard, Dashboard};
pub use student::StudentDesk;
pub use teacher::{EnrolledStudent, TeacherDesk};

use rand::Rng;
use serde::Serialize;

use crate::db::models::Classroom;
use crate::db::{Collection, Database};
use crate::error::{MonitorError, MonitorResult};

pub const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A stored document together with its id.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub value: T,
}

impl<T> From<(String, T)> for Stored<T> {
    fn from((id, value): (String, T)) -> Self {
        Self { id, value }
    }
}

pub fn generate_join_code(rng: &mut impl Rng) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

pub(crate) async fn load_class(db: &Database, class_id: &str) -> MonitorResult<Classroom> {
    db.get_as::<Classroom>(Collection::Classes, class_id)
        .await?
        .ok_or_else(|| MonitorError::NotFound(format!("class {class_id}")))
}
