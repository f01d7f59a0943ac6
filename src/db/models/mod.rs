pub mod attendance;
pub mod classroom;
pub mod session;
pub mod user;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use classroom::{Classroom, LessonSummary};
pub use session::{LectureSession, ProcessingStatus};
pub use user::{Role, UserProfile};
