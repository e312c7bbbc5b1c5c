use std::sync::{Arc, Mutex, RwLock};

use super::{Dataset, Store};
use crate::{PatientError, PatientResult};

/// Keeps the dataset in memory only.
///
/// Readers clone an `Arc` of the current snapshot and release the lock straight away;
/// writers are serialised by a separate mutex and swap in a new snapshot on success.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: RwLock<Arc<Dataset>>,
    writer: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: Dataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(dataset)),
            writer: Mutex::new(()),
        }
    }

    /// The current committed dataset.
    pub fn snapshot(&self) -> PatientResult<Arc<Dataset>> {
        let guard = self
            .current
            .read()
            .map_err(|_| PatientError::StoreLockPoisoned)?;
        Ok(Arc::clone(&guard))
    }

    /// Runs `f` on a working copy, hands the result to `persist`, then publishes it.
    /// Nothing becomes visible if either step fails.
    pub(crate) fn commit_with<R>(
        &self,
        f: impl FnOnce(&mut Dataset) -> PatientResult<R>,
        persist: impl FnOnce(&Dataset) -> PatientResult<()>,
    ) -> PatientResult<R> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| PatientError::StoreLockPoisoned)?;

        let snapshot: Arc<Dataset> = self.snapshot()?;
        let mut working = Dataset::clone(&snapshot);
        let out = f(&mut working)?;
        persist(&working)?;

        let mut current = self
            .current
            .write()
            .map_err(|_| PatientError::StoreLockPoisoned)?;
        *current = Arc::new(working);
        Ok(out)
    }
}

impl Store for MemoryStore {
    fn read<R>(&self, f: impl FnOnce(&Dataset) -> R) -> PatientResult<R> {
        let snapshot = self.snapshot()?;
        Ok(f(&snapshot))
    }

    fn transaction<R>(&self, f: impl FnOnce(&mut Dataset) -> PatientResult<R>) -> PatientResult<R> {
        self.commit_with(f, |_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Patient, RecordStatus};
    use chrono::Utc;
    use fisio_types::NonEmptyText;
    use std::thread;
    use uuid::Uuid;

    fn patient(name: &str) -> Patient {
        let now = Utc::now();
        Patient {
            id: Uuid::new_v4(),
            first_name: NonEmptyText::new(name).unwrap(),
            last_name: NonEmptyText::new("Bianchi").unwrap(),
            fiscal_code: None,
            birth_date: None,
            gender: None,
            email: None,
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            province: None,
            occupation: None,
            notes: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn failed_transaction_leaves_dataset_untouched() {
        let store = MemoryStore::new();
        let before = store.snapshot().unwrap();

        let result: PatientResult<()> = store.transaction(|data| {
            data.insert_patient(patient("Anna"))?;
            Err(PatientError::InvalidInput("abort".into()))
        });

        assert!(result.is_err());
        assert_eq!(*store.snapshot().unwrap(), *before);
        assert_eq!(store.read(|d| d.patients().count()).unwrap(), 0);
    }

    #[test]
    fn committed_transaction_is_visible_to_readers() {
        let store = MemoryStore::new();
        let p = patient("Luca");
        let id = p.id;
        store.transaction(|data| data.insert_patient(p)).unwrap();
        let name = store
            .read(|d| d.patient(id).map(|p| p.full_name()))
            .unwrap()
            .unwrap();
        assert_eq!(name, "Luca Bianchi");
    }

    #[test]
    fn earlier_snapshots_are_not_affected_by_later_commits() {
        let store = MemoryStore::new();
        let old = store.snapshot().unwrap();
        store.transaction(|data| data.insert_patient(patient("Sara"))).unwrap();
        assert_eq!(old.patients().count(), 0);
        assert_eq!(store.snapshot().unwrap().patients().count(), 1);
    }

    #[test]
    fn concurrent_writers_respect_active_record_constraint() {
        use crate::model::ClinicalRecord;

        let store = Arc::new(MemoryStore::new());
        let p = patient("Giulia");
        let patient_id = p.id;
        store.transaction(|data| data.insert_patient(p)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.transaction(|data| {
                        let now = Utc::now();
                        data.insert_record(ClinicalRecord {
                            id: Uuid::new_v4(),
                            patient_id,
                            record_number: format!("CC-{i}"),
                            diagnosis: NonEmptyText::new("Lombalgia").unwrap(),
                            anamnesis: None,
                            objective_examination: None,
                            clinical_examination: None,
                            treatment_plan: None,
                            notes: None,
                            status: RecordStatus::Active,
                            created_at: now,
                            updated_at: now,
                            closed_at: None,
                        })
                    })
                })
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("writer thread panicked"))
            .filter(Result::is_ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(store.read(|d| d.records_of(patient_id).len()).unwrap(), 1);
    }
}
