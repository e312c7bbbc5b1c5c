//! Record timeline: everything that happened on one clinical record as a single list,
//! most recent first.
//!
//! Events are emitted in a fixed order (record opening, therapies, sessions, vital signs,
//! body mappings, documents, closure) and then stably sorted by date, so events sharing
//! a timestamp keep that order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{therapy_type, BodySide, DocumentCategory};
use crate::store::Dataset;
use crate::PatientResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineEventType {
    RecordCreated,
    TherapyAdded,
    Session,
    VitalSigns,
    BodyMapping,
    DocumentUploaded,
    RecordClosed,
}

/// Type-specific details of a [`TimelineEvent`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum EventPayload {
    Record {
        record_number: String,
        diagnosis: String,
    },
    Therapy {
        therapy_type: String,
        prescribed_sessions: u32,
        completed_sessions: u32,
    },
    Session {
        therapy_id: Uuid,
        session_number: u32,
        vas_before: Option<u8>,
        vas_after: Option<u8>,
    },
    VitalSigns {
        blood_pressure: Option<String>,
        heart_rate: Option<u16>,
        temperature: Option<f32>,
        oxygen_saturation: Option<u8>,
        weight_kg: Option<f32>,
    },
    BodyMapping {
        body_region: String,
        side: Option<BodySide>,
        pain_intensity: Option<u8>,
    },
    Document {
        file_name: String,
        category: DocumentCategory,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Id of the entity the event describes.
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: TimelineEventType,
    pub date: DateTime<Utc>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub payload: EventPayload,
}

fn therapy_name(code: &str) -> &str {
    therapy_type(code).map_or(code, |t| t.name)
}

/// Collects the timeline of `record_id`.
///
/// # Errors
///
/// Returns [`crate::PatientError::RecordNotFound`] for an unknown record.
pub fn build_timeline(data: &Dataset, record_id: Uuid) -> PatientResult<Vec<TimelineEvent>> {
    let record = data.record(record_id)?;
    let therapies = data.therapies_of(record_id);
    let mut events = Vec::new();

    events.push(TimelineEvent {
        id: record.id,
        event_type: TimelineEventType::RecordCreated,
        date: record.created_at,
        description: format!(
            "Clinical record {} opened: {}",
            record.record_number, record.diagnosis
        ),
        status: None,
        payload: EventPayload::Record {
            record_number: record.record_number.clone(),
            diagnosis: record.diagnosis.to_string(),
        },
    });

    for therapy in &therapies {
        events.push(TimelineEvent {
            id: therapy.id,
            event_type: TimelineEventType::TherapyAdded,
            date: therapy.created_at,
            description: format!(
                "Therapy prescribed: {} ({} sessions)",
                therapy_name(&therapy.therapy_type),
                therapy.prescribed_sessions
            ),
            status: Some(therapy.effective_status().to_string()),
            payload: EventPayload::Therapy {
                therapy_type: therapy.therapy_type.clone(),
                prescribed_sessions: therapy.prescribed_sessions,
                completed_sessions: therapy.completed_sessions,
            },
        });
    }

    for therapy in &therapies {
        for session in data.sessions_of(therapy.id) {
            events.push(TimelineEvent {
                id: session.id,
                event_type: TimelineEventType::Session,
                date: session.event_date(),
                description: format!(
                    "{} session {}/{}",
                    therapy_name(&therapy.therapy_type),
                    session.session_number,
                    therapy.prescribed_sessions
                ),
                status: Some(session.status.to_string()),
                payload: EventPayload::Session {
                    therapy_id: therapy.id,
                    session_number: session.session_number,
                    vas_before: session.vas_score_before.map(|v| v.value()),
                    vas_after: session.vas_score_after.map(|v| v.value()),
                },
            });
        }
    }

    for vitals in data.vital_signs_of(record_id) {
        events.push(TimelineEvent {
            id: vitals.id,
            event_type: TimelineEventType::VitalSigns,
            date: vitals.measured_at,
            description: vitals.summary(),
            status: None,
            payload: EventPayload::VitalSigns {
                blood_pressure: vitals.blood_pressure(),
                heart_rate: vitals.heart_rate,
                temperature: vitals.temperature,
                oxygen_saturation: vitals.oxygen_saturation,
                weight_kg: vitals.weight_kg,
            },
        });
    }

    for mapping in data.body_mappings_of(record_id) {
        let description = match mapping.pain_intensity {
            Some(vas) => format!("Pain mapped: {} (VAS {})", mapping.body_region, vas),
            None => format!("Pain mapped: {}", mapping.body_region),
        };
        events.push(TimelineEvent {
            id: mapping.id,
            event_type: TimelineEventType::BodyMapping,
            date: mapping.recorded_at,
            description,
            status: None,
            payload: EventPayload::BodyMapping {
                body_region: mapping.body_region.to_string(),
                side: mapping.side,
                pain_intensity: mapping.pain_intensity.map(|v| v.value()),
            },
        });
    }

    for document in data.documents_of_record(record_id) {
        events.push(TimelineEvent {
            id: document.id,
            event_type: TimelineEventType::DocumentUploaded,
            date: document.uploaded_at,
            description: format!("Document uploaded: {}", document.file_name),
            status: None,
            payload: EventPayload::Document {
                file_name: document.file_name.to_string(),
                category: document.category,
            },
        });
    }

    if let Some(closed_at) = record.closed_at {
        events.push(TimelineEvent {
            id: record.id,
            event_type: TimelineEventType::RecordClosed,
            date: closed_at,
            description: format!("Clinical record {} closed", record.record_number),
            status: Some(record.status.to_string()),
            payload: EventPayload::Record {
                record_number: record.record_number.clone(),
                diagnosis: record.diagnosis.to_string(),
            },
        });
    }

    events.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(events)
}
