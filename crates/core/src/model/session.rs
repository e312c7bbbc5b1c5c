use chrono::{DateTime, Utc};
use fisio_types::VasScore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::therapy::TherapyParameters;
use crate::{PatientError, PatientResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    Missed,
}

impl SessionStatus {
    /// `COMPLETED -> COMPLETED` is allowed: re-recording an outcome overwrites it.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus as S;
        matches!(
            (self, next),
            (S::Scheduled, S::Completed | S::Cancelled | S::Missed) | (S::Completed, S::Completed)
        )
    }

    /// Counts against the therapy's prescribed sessions.
    pub fn is_live(self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
            SessionStatus::Missed => "MISSED",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapySession {
    pub id: Uuid,
    pub therapy_id: Uuid,
    pub session_number: u32,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub performed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vas_score_before: Option<VasScore>,
    #[serde(default)]
    pub vas_score_after: Option<VasScore>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parameters: Option<TherapyParameters>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TherapySession {
    /// When the session happened, or is due to happen.
    pub fn event_date(&self) -> DateTime<Utc> {
        self.performed_at.unwrap_or(self.scheduled_at)
    }

    pub(crate) fn transition(&mut self, next: SessionStatus, now: DateTime<Utc>) -> PatientResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PatientError::IllegalTransition {
                entity: "session",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// VAS readings recorded on this session, before first.
    pub fn vas_values(&self) -> impl Iterator<Item = VasScore> {
        self.vas_score_before.into_iter().chain(self.vas_score_after)
    }

    /// Pain reduction within the session, when both readings exist.
    pub fn vas_improvement(&self) -> Option<i32> {
        match (self.vas_score_before, self.vas_score_after) {
            (Some(before), Some(after)) => Some(i32::from(before.value()) - i32::from(after.value())),
            _ => None,
        }
    }
}

/// Outcome recorded when completing a session.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub vas_before: Option<i64>,
    pub vas_after: Option<i64>,
    pub notes: Option<String>,
    pub parameters: Option<TherapyParameters>,
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_scheduled_sessions_move_forward() {
        use SessionStatus as S;
        assert!(S::Scheduled.can_transition_to(S::Completed));
        assert!(S::Scheduled.can_transition_to(S::Missed));
        assert!(S::Completed.can_transition_to(S::Completed));
        assert!(!S::Completed.can_transition_to(S::Cancelled));
        assert!(!S::Cancelled.can_transition_to(S::Scheduled));
        assert!(!S::Missed.can_transition_to(S::Completed));
    }

    #[test]
    fn cancelled_and_missed_sessions_are_not_live() {
        assert!(SessionStatus::Scheduled.is_live());
        assert!(SessionStatus::Completed.is_live());
        assert!(!SessionStatus::Cancelled.is_live());
        assert!(!SessionStatus::Missed.is_live());
    }

    #[test]
    fn improvement_needs_both_readings() {
        let now = Utc::now();
        let mut session = TherapySession {
            id: Uuid::new_v4(),
            therapy_id: Uuid::new_v4(),
            session_number: 1,
            status: SessionStatus::Completed,
            scheduled_at: now,
            duration_minutes: None,
            performed_at: Some(now),
            vas_score_before: Some(VasScore::new(7).unwrap()),
            vas_score_after: None,
            notes: None,
            parameters: None,
            signature: None,
            signed_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(session.vas_improvement(), None);
        session.vas_score_after = Some(VasScore::new(4).unwrap());
        assert_eq!(session.vas_improvement(), Some(3));
        assert_eq!(session.vas_values().count(), 2);
    }
}
