use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// One student's attendance for one class day.
/// Keyed `attendance/{classId}_{studentId}_{date}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub class_id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl AttendanceRecord {
    pub fn document_id(class_id: &str, student_id: &str, date: NaiveDate) -> String {
        format!("{class_id}_{student_id}_{}", date.format("%Y-%m-%d"))
    }

    pub fn id(&self) -> String {
        Self::document_id(&self.class_id, &self.student_id, self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_id_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(AttendanceRecord::document_id("c1", "s9", date), "c1_s9_2024-03-07");
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let record = AttendanceRecord {
            class_id: "c1".into(),
            student_id: "s9".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            status: AttendanceStatus::Present,
            timestamp: "2024-03-07T09:00:00Z".parse().unwrap(),
            confidence: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["classId"], json!("c1"));
        assert_eq!(value["date"], json!("2024-03-07"));
        assert_eq!(value["status"], json!("present"));
    }
}
