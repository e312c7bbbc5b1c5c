//! Aggregate figures for a clinical record or a patient.
//!
//! Therapy states are read through [`Therapy::effective_status`], so a course whose
//! sessions are all done counts as completed even if its stored status lags behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{SessionStatus, Therapy, TherapySession, TherapyStatus};
use crate::store::Dataset;
use crate::PatientResult;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapyProgress {
    pub therapy_id: Uuid,
    pub therapy_type: String,
    pub status: TherapyStatus,
    pub prescribed_sessions: u32,
    pub completed_sessions: u32,
    pub completion_percentage: f64,
    /// VAS before the first completed session that has one.
    pub initial_vas: Option<u8>,
    /// VAS after (or else before) the last completed session that has one.
    pub latest_vas: Option<u8>,
    /// `initial_vas - latest_vas`; positive means less pain.
    pub vas_improvement: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VasTrendPoint {
    pub session_id: Uuid,
    pub therapy_id: Uuid,
    pub session_number: u32,
    pub date: DateTime<Utc>,
    pub vas_before: Option<u8>,
    pub vas_after: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatistics {
    pub record_id: Uuid,
    pub total_therapies: usize,
    pub completed_therapies: usize,
    /// Therapies IN_PROGRESS.
    pub active_therapies: usize,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub cancelled_sessions: usize,
    pub missed_sessions: usize,
    #[serde(rename = "averageVAS")]
    pub average_vas: Option<f64>,
    /// Percentage of sessions completed; 0 when there are none.
    pub session_completion_rate: f64,
    pub duration_days: i64,
    pub therapy_progress: Vec<TherapyProgress>,
    pub vas_trend: Vec<VasTrendPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStatistics {
    pub patient_id: Uuid,
    pub records_count: usize,
    pub total_therapies: usize,
    pub completed_therapies: usize,
    pub active_therapies: usize,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    #[serde(rename = "averageVAS")]
    pub average_vas: Option<f64>,
    pub last_visit: Option<DateTime<Utc>>,
    pub next_appointment: Option<DateTime<Utc>>,
    pub documents_count: usize,
}

/// Mean of every VAS reading (before and after) on `sessions`.
pub fn average_vas<'a>(sessions: impl IntoIterator<Item = &'a TherapySession>) -> Option<f64> {
    let (sum, count) = sessions
        .into_iter()
        .flat_map(|s| s.vas_values())
        .fold((0u32, 0u32), |(sum, count), vas| {
            (sum + u32::from(vas.value()), count + 1)
        });
    (count > 0).then(|| f64::from(sum) / f64::from(count))
}

fn count_status(therapies: &[&Therapy], status: TherapyStatus) -> usize {
    therapies
        .iter()
        .filter(|t| t.effective_status() == status)
        .count()
}

fn count_sessions(sessions: &[&TherapySession], status: SessionStatus) -> usize {
    sessions.iter().filter(|s| s.status == status).count()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn progress(therapy: &Therapy, sessions: &[&TherapySession]) -> TherapyProgress {
    let completed: Vec<_> = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();
    let initial_vas = completed
        .iter()
        .find_map(|s| s.vas_score_before.or(s.vas_score_after))
        .map(|v| v.value());
    let latest_vas = completed
        .iter()
        .rev()
        .find_map(|s| s.vas_score_after.or(s.vas_score_before))
        .map(|v| v.value());

    TherapyProgress {
        therapy_id: therapy.id,
        therapy_type: therapy.therapy_type.clone(),
        status: therapy.effective_status(),
        prescribed_sessions: therapy.prescribed_sessions,
        completed_sessions: therapy.completed_sessions,
        completion_percentage: percentage(
            therapy.completed_sessions as usize,
            therapy.prescribed_sessions as usize,
        ),
        initial_vas,
        latest_vas,
        vas_improvement: initial_vas
            .zip(latest_vas)
            .map(|(first, last)| i32::from(first) - i32::from(last)),
    }
}

/// Statistics of one clinical record as of `now`.
///
/// # Errors
///
/// Returns [`crate::PatientError::RecordNotFound`] for an unknown record.
pub fn record_statistics(data: &Dataset, record_id: Uuid, now: DateTime<Utc>) -> PatientResult<RecordStatistics> {
    let record = data.record(record_id)?;
    let therapies = data.therapies_of(record_id);

    let mut all_sessions = Vec::new();
    let mut therapy_progress = Vec::with_capacity(therapies.len());
    for therapy in &therapies {
        let sessions = data.sessions_of(therapy.id);
        therapy_progress.push(progress(therapy, &sessions));
        all_sessions.extend(sessions);
    }

    let total_sessions = all_sessions.len();
    let completed_sessions = count_sessions(&all_sessions, SessionStatus::Completed);

    let mut vas_trend: Vec<_> = all_sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .filter(|s| s.vas_score_before.is_some() || s.vas_score_after.is_some())
        .map(|s| VasTrendPoint {
            session_id: s.id,
            therapy_id: s.therapy_id,
            session_number: s.session_number,
            date: s.event_date(),
            vas_before: s.vas_score_before.map(|v| v.value()),
            vas_after: s.vas_score_after.map(|v| v.value()),
        })
        .collect();
    vas_trend.sort_by_key(|p| p.date);

    Ok(RecordStatistics {
        record_id,
        total_therapies: therapies.len(),
        completed_therapies: count_status(&therapies, TherapyStatus::Completed),
        active_therapies: count_status(&therapies, TherapyStatus::InProgress),
        total_sessions,
        completed_sessions,
        cancelled_sessions: count_sessions(&all_sessions, SessionStatus::Cancelled),
        missed_sessions: count_sessions(&all_sessions, SessionStatus::Missed),
        average_vas: average_vas(all_sessions.iter().copied()),
        session_completion_rate: percentage(completed_sessions, total_sessions),
        duration_days: (record.closed_at.unwrap_or(now) - record.created_at).num_days(),
        therapy_progress,
        vas_trend,
    })
}

/// Statistics across every record of a live patient as of `now`.
pub fn patient_statistics(data: &Dataset, patient_id: Uuid, now: DateTime<Utc>) -> PatientResult<PatientStatistics> {
    data.patient(patient_id)?;
    let records = data.records_of(patient_id);
    let therapies: Vec<&Therapy> = records
        .iter()
        .flat_map(|r| data.therapies_of(r.id))
        .collect();
    let sessions = data.sessions_of_patient(patient_id);

    let last_visit = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .map(|s| s.event_date())
        .max();
    let next_appointment = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Scheduled && s.scheduled_at > now)
        .map(|s| s.scheduled_at)
        .min();

    Ok(PatientStatistics {
        patient_id,
        records_count: records.len(),
        total_therapies: therapies.len(),
        completed_therapies: count_status(&therapies, TherapyStatus::Completed),
        active_therapies: count_status(&therapies, TherapyStatus::InProgress),
        total_sessions: sessions.len(),
        completed_sessions: count_sessions(&sessions, SessionStatus::Completed),
        average_vas: average_vas(sessions.iter().copied()),
        last_visit,
        next_appointment,
        documents_count: data.documents_of_patient(patient_id).len(),
    })
}
