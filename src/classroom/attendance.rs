use std::collections::BTreeMap;

use crate::db::models::{AttendanceRecord, AttendanceStatus};
use crate::db::{Collection, Database};
use crate::error::MonitorResult;
use crate::monitor::MonitorReport;
use crate::services::RecognitionClient;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Writes a `present` record for every student recognised during the
/// session, plus any the service confirmed on stop. Records are keyed by
/// class, student and the session's start date, so saving the same day twice
/// updates rather than duplicates.
pub async fn persist_attendance(
    db: &Database,
    report: &MonitorReport<RecognitionClient>,
) -> MonitorResult<Vec<AttendanceRecord>> {
    let class_id = &report.session.class_id;
    let date = report.session.started_at.date_naive();

    let mut records: BTreeMap<&str, AttendanceRecord> = BTreeMap::new();
    for sighting in &report.results {
        records.insert(
            sighting.identity.as_str(),
            AttendanceRecord {
                class_id: class_id.clone(),
                student_id: sighting.identity.clone(),
                date,
                status: AttendanceStatus::Present,
                timestamp: sighting.first_seen,
                confidence: Some(sighting.best_confidence),
            },
        );
    }
    let confirmed = report
        .summary
        .iter()
        .flat_map(|summary| summary.present_students_uids.iter());
    for uid in confirmed {
        records.entry(uid.as_str()).or_insert_with(|| AttendanceRecord {
            class_id: class_id.clone(),
            student_id: uid.clone(),
            date,
            status: AttendanceStatus::Present,
            timestamp: report.stopped_at,
            confidence: None,
        });
    }

    let records: Vec<AttendanceRecord> = records.into_values().collect();
    for record in &records {
        db.set(Collection::Attendance, &record.id(), record, true)
            .await?;
    }
    log_info!(
        "Saved {} attendance records for class {class_id} on {date}",
        records.len()
    );
    Ok(records)
}
