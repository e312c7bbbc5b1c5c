//! Session outcomes: completion with VAS readings, cancellation and no-shows.

use fisio_types::VasScore;
use uuid::Uuid;

use crate::constants::NOTE_DATE_FORMAT;
use crate::context::CoreContext;
use crate::model::patient::optional_text;
use crate::model::record::append_note;
use crate::model::{therapy_type, SessionOutcome, SessionStatus, TherapySession};
use crate::store::Store;
use crate::{PatientError, PatientResult};

#[derive(Clone)]
pub struct SessionService<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> SessionService<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    pub fn get(&self, id: Uuid) -> PatientResult<TherapySession> {
        self.ctx.store.read(|data| data.session(id).cloned())?
    }

    /// Records the outcome of a session and marks it COMPLETED.
    ///
    /// The first completion of a session advances the therapy's completed count (and its
    /// status); completing an already COMPLETED session only overwrites the recorded
    /// outcome.
    ///
    /// # Errors
    ///
    /// - [`PatientError::Text`] if a VAS value lies outside 0-10;
    /// - [`PatientError::ParameterCategoryMismatch`] if the parameters do not fit the
    ///   therapy type;
    /// - [`PatientError::IllegalTransition`] if the session was cancelled or missed, or
    ///   the therapy is no longer open.
    pub fn complete(&self, id: Uuid, outcome: SessionOutcome) -> PatientResult<TherapySession> {
        let vas_before = outcome.vas_before.map(VasScore::new).transpose()?;
        let vas_after = outcome.vas_after.map(VasScore::new).transpose()?;
        let signature = optional_text(outcome.signature);
        let notes = optional_text(outcome.notes);
        let now = self.ctx.now();

        let (session, first_completion) = self.ctx.store.transaction(|data| {
            let session = data.session(id)?;
            let therapy_id = session.therapy_id;
            let first_completion = session.status != SessionStatus::Completed;

            if let Some(parameters) = &outcome.parameters {
                let therapy = data.therapy(therapy_id)?;
                parameters.validate_for(therapy_type(&therapy.therapy_type)?)?;
            }

            let session = data.session_mut(id)?;
            session.transition(SessionStatus::Completed, now)?;
            session.vas_score_before = vas_before;
            session.vas_score_after = vas_after;
            session.performed_at = Some(now);
            if notes.is_some() {
                session.notes = notes;
            }
            if outcome.parameters.is_some() {
                session.parameters = outcome.parameters;
            }
            if signature.is_some() {
                session.signature = signature;
                session.signed_at = Some(now);
            }
            let session = session.clone();

            if first_completion {
                data.therapy_mut(therapy_id)?.register_completion(now)?;
            }
            Ok((session, first_completion))
        })?;

        tracing::info!(
            session_id = %id,
            therapy_id = %session.therapy_id,
            first_completion,
            "session completed"
        );
        Ok(session)
    }

    /// Cancels a SCHEDULED session. The reason is appended to the session notes.
    pub fn cancel(&self, id: Uuid, reason: &str) -> PatientResult<TherapySession> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PatientError::InvalidInput("a cancellation reason is required".into()));
        }
        let now = self.ctx.now();
        let line = format!("Cancelled on {}: {}", now.format(NOTE_DATE_FORMAT), reason);
        let session = self.ctx.store.transaction(|data| {
            let session = data.session_mut(id)?;
            session.transition(SessionStatus::Cancelled, now)?;
            append_note(&mut session.notes, &line);
            Ok(session.clone())
        })?;
        tracing::info!(session_id = %id, "session cancelled");
        Ok(session)
    }

    /// SCHEDULED -> MISSED for a patient who did not show up.
    pub fn mark_missed(&self, id: Uuid) -> PatientResult<TherapySession> {
        let now = self.ctx.now();
        let session = self.ctx.store.transaction(|data| {
            let session = data.session_mut(id)?;
            session.transition(SessionStatus::Missed, now)?;
            Ok(session.clone())
        })?;
        tracing::info!(session_id = %id, "session marked missed");
        Ok(session)
    }
}
