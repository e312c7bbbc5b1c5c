//! Therapy course tracking: scheduling sessions and the explicit suspend, resume and
//! cancel transitions. Completion counts are advanced by [`super::SessionService`].

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::constants::NOTE_DATE_FORMAT;
use crate::context::CoreContext;
use crate::model::record::append_note;
use crate::model::{SessionStatus, Therapy, TherapySession, TherapyStatus};
use crate::store::{Dataset, Store};
use crate::{PatientError, PatientResult};

/// Adds one SCHEDULED session to `therapy_id` inside an open transaction.
///
/// Session numbers count every session ever created for the therapy, so they stay
/// sequential even when earlier sessions were cancelled.
fn push_session(
    data: &mut Dataset,
    therapy_id: Uuid,
    scheduled_at: DateTime<Utc>,
    duration_minutes: Option<u32>,
    now: DateTime<Utc>,
) -> PatientResult<TherapySession> {
    let therapy = data.therapy(therapy_id)?;
    if !therapy.status.is_open() {
        return Err(PatientError::TherapyNotSchedulable {
            therapy_id,
            status: therapy.status.to_string(),
        });
    }

    let existing = data.sessions_of(therapy_id);
    let live = existing.iter().filter(|s| s.status.is_live()).count();
    if live >= therapy.prescribed_sessions as usize {
        return Err(PatientError::SessionLimitReached {
            therapy_id,
            prescribed: therapy.prescribed_sessions,
        });
    }

    let session = TherapySession {
        id: Uuid::new_v4(),
        therapy_id,
        session_number: existing.len() as u32 + 1,
        status: SessionStatus::Scheduled,
        scheduled_at,
        duration_minutes,
        performed_at: None,
        vas_score_before: None,
        vas_score_after: None,
        notes: None,
        parameters: None,
        signature: None,
        signed_at: None,
        created_at: now,
        updated_at: now,
    };
    data.insert_session(session.clone())?;
    Ok(session)
}

#[derive(Clone)]
pub struct TherapyService<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> TherapyService<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    pub fn get(&self, id: Uuid) -> PatientResult<Therapy> {
        self.ctx.store.read(|data| data.therapy(id).cloned())?
    }

    /// The therapy's sessions ordered by session number.
    pub fn sessions(&self, id: Uuid) -> PatientResult<Vec<TherapySession>> {
        self.ctx.store.read(|data| -> PatientResult<_> {
            data.therapy(id)?;
            Ok(data.sessions_of(id).into_iter().cloned().collect())
        })?
    }

    /// Schedules the next session of a SCHEDULED or IN_PROGRESS therapy.
    ///
    /// # Errors
    ///
    /// - [`PatientError::TherapyNotSchedulable`] if the therapy is completed, cancelled or
    ///   suspended;
    /// - [`PatientError::SessionLimitReached`] if the scheduled and completed sessions
    ///   already cover the prescription.
    pub fn schedule_session(
        &self,
        therapy_id: Uuid,
        scheduled_at: DateTime<Utc>,
        duration_minutes: Option<u32>,
    ) -> PatientResult<TherapySession> {
        let now = self.ctx.now();
        let session = self.ctx.store.transaction(|data| {
            push_session(data, therapy_id, scheduled_at, duration_minutes, now)
        })?;
        tracing::info!(therapy_id = %therapy_id, session_number = session.session_number, "session scheduled");
        Ok(session)
    }

    /// Schedules every session still missing from the prescription, `interval_days`
    /// apart starting at `first`.
    pub fn schedule_course(
        &self,
        therapy_id: Uuid,
        first: DateTime<Utc>,
        interval_days: u32,
    ) -> PatientResult<Vec<TherapySession>> {
        if interval_days == 0 {
            return Err(PatientError::InvalidInput(
                "sessions must be at least one day apart".into(),
            ));
        }
        let now = self.ctx.now();
        let sessions = self.ctx.store.transaction(|data| {
            let therapy = data.therapy(therapy_id)?;
            let live = data
                .sessions_of(therapy_id)
                .iter()
                .filter(|s| s.status.is_live())
                .count() as u32;
            let missing = therapy.prescribed_sessions.saturating_sub(live);
            let duration = crate::model::therapy_type(&therapy.therapy_type)
                .ok()
                .map(|t| t.default_duration_minutes);

            (0..missing)
                .map(|i| {
                    let at = first + Duration::days(i64::from(i) * i64::from(interval_days));
                    push_session(data, therapy_id, at, duration, now)
                })
                .collect::<PatientResult<Vec<_>>>()
        })?;
        tracing::info!(therapy_id = %therapy_id, scheduled = sessions.len(), "therapy course scheduled");
        Ok(sessions)
    }

    pub fn suspend(&self, id: Uuid) -> PatientResult<Therapy> {
        self.change_status(id, |_| TherapyStatus::Suspended)
    }

    /// SUSPENDED -> IN_PROGRESS, or SCHEDULED if no session was completed yet.
    /// Refused when the record has been closed in the meantime.
    pub fn resume(&self, id: Uuid) -> PatientResult<Therapy> {
        self.change_status(id, |therapy| {
            if therapy.completed_sessions > 0 {
                TherapyStatus::InProgress
            } else {
                TherapyStatus::Scheduled
            }
        })
    }

    fn change_status(&self, id: Uuid, next: impl FnOnce(&Therapy) -> TherapyStatus) -> PatientResult<Therapy> {
        let now = self.ctx.now();
        let result = self.ctx.store.transaction(|data| {
            let therapy = data.therapy(id)?;
            let record_id = therapy.record_id;
            let next = next(therapy);
            if next.is_open() && !data.record(record_id)?.is_active() {
                return Err(PatientError::RecordClosed(record_id));
            }
            let therapy = data.therapy_mut(id)?;
            therapy.transition(next, now)?;
            Ok(therapy.clone())
        });
        match &result {
            Ok(t) => tracing::info!(therapy_id = %id, status = %t.status, "therapy status changed"),
            Err(e) => tracing::warn!(therapy_id = %id, error = %e, "therapy transition refused"),
        }
        result
    }

    /// Cancels the course and every session of it that is still SCHEDULED.
    pub fn cancel(&self, id: Uuid, reason: &str) -> PatientResult<Therapy> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PatientError::InvalidInput("a cancellation reason is required".into()));
        }
        let now = self.ctx.now();
        let line = format!("Cancelled on {}: {}", now.format(NOTE_DATE_FORMAT), reason);

        let (therapy, cancelled) = self.ctx.store.transaction(|data| {
            let therapy = data.therapy_mut(id)?;
            therapy.transition(TherapyStatus::Cancelled, now)?;
            append_note(&mut therapy.notes, &line);
            let therapy = therapy.clone();

            let pending: Vec<Uuid> = data
                .sessions_of(id)
                .iter()
                .filter(|s| s.status == SessionStatus::Scheduled)
                .map(|s| s.id)
                .collect();
            for session_id in &pending {
                let session = data.session_mut(*session_id)?;
                session.transition(SessionStatus::Cancelled, now)?;
                append_note(&mut session.notes, &line);
            }
            Ok((therapy, pending.len()))
        })?;

        tracing::info!(therapy_id = %id, cancelled_sessions = cancelled, "therapy cancelled");
        Ok(therapy)
    }
}
