//! Collaborators injected into every service: the store, a clock and a record-number source.
//!
//! Services are plain values built from a [`CoreContext`]; they keep no state of their own,
//! so a context can be cloned freely and shared across threads.

use crate::config::CoreConfig;
use crate::store::Store;
use chrono::{DateTime, NaiveDate, Utc};
use fisio_ids::RecordNumberGenerator;
use std::sync::Arc;

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant, for tests and reproducible batch runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Supplies candidate record numbers. Uniqueness is checked by the store, so a source
/// only has to make collisions unlikely.
pub trait RecordNumberSource: Send + Sync {
    fn next_record_number(&self, now: DateTime<Utc>) -> String;
}

impl RecordNumberSource for RecordNumberGenerator {
    fn next_record_number(&self, now: DateTime<Utc>) -> String {
        self.generate(now).to_string()
    }
}

/// Everything a service needs, bundled so services stay cheap to construct.
pub struct CoreContext<S> {
    pub(crate) store: Arc<S>,
    pub(crate) cfg: Arc<CoreConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) record_numbers: Arc<dyn RecordNumberSource>,
}

impl<S> Clone for CoreContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cfg: Arc::clone(&self.cfg),
            clock: Arc::clone(&self.clock),
            record_numbers: Arc::clone(&self.record_numbers),
        }
    }
}

impl<S: Store> CoreContext<S> {
    /// Context using the wall clock and the configured record-number generator.
    pub fn new(store: Arc<S>, cfg: Arc<CoreConfig>) -> Self {
        let record_numbers: Arc<dyn RecordNumberSource> = Arc::new(cfg.record_numbers().clone());
        Self {
            store,
            cfg,
            clock: Arc::new(SystemClock),
            record_numbers,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_record_numbers(mut self, source: Arc<dyn RecordNumberSource>) -> Self {
        self.record_numbers = source;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
