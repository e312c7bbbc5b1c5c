//! Test doubles shared by the service tests.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::CoreConfig;
use crate::context::{CoreContext, FixedClock, RecordNumberSource};
use crate::model::{NewPatient, NewRecord, NewTherapy};
use crate::store::MemoryStore;

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
}

/// Hands out `CC-20261018-00000001`, `...02`, and so on.
#[derive(Default)]
pub(crate) struct SequentialNumbers(AtomicU32);

impl RecordNumberSource for SequentialNumbers {
    fn next_record_number(&self, _now: DateTime<Utc>) -> String {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        format!("CC-20261018-{n:08X}")
    }
}

/// Replays a fixed list of numbers, repeating the last one.
pub(crate) struct ScriptedNumbers(Mutex<Vec<String>>);

impl ScriptedNumbers {
    pub(crate) fn new(numbers: &[&str]) -> Self {
        let mut numbers: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
        numbers.reverse();
        Self(Mutex::new(numbers))
    }
}

impl RecordNumberSource for ScriptedNumbers {
    fn next_record_number(&self, _now: DateTime<Utc>) -> String {
        let mut numbers = self.0.lock().unwrap();
        if numbers.len() > 1 {
            numbers.pop().unwrap()
        } else {
            numbers.last().cloned().unwrap()
        }
    }
}

pub(crate) fn context() -> CoreContext<MemoryStore> {
    CoreContext::new(Arc::new(MemoryStore::new()), Arc::new(CoreConfig::default()))
        .with_clock(Arc::new(FixedClock(now())))
        .with_record_numbers(Arc::new(SequentialNumbers::default()))
}

pub(crate) fn patient_input(first: &str, last: &str) -> NewPatient {
    NewPatient {
        first_name: first.into(),
        last_name: last.into(),
        ..Default::default()
    }
}

pub(crate) fn record_input(diagnosis: &str) -> NewRecord {
    NewRecord {
        diagnosis: diagnosis.into(),
        ..Default::default()
    }
}

pub(crate) fn therapy_input(code: &str, sessions: u32) -> NewTherapy {
    NewTherapy {
        therapy_type: code.into(),
        prescribed_sessions: sessions,
        frequency: None,
        district: None,
        start_date: None,
        notes: None,
        parameters: None,
    }
}
