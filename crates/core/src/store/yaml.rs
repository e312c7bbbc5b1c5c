use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Dataset, MemoryStore, Store};
use crate::{PatientError, PatientResult};

/// A [`MemoryStore`] mirrored to a single YAML file.
///
/// Each transaction rewrites the whole file: the dataset is written to a sibling
/// `*.tmp` file which is then renamed over the original, so readers of the file never
/// see a half-written document. A missing file is an empty dataset; it is created on
/// the first commit.
#[derive(Debug)]
pub struct YamlFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl YamlFileStore {
    /// Loads `path`, or starts empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`PatientError::FileRead`] if the file exists but cannot be read, and
    /// [`PatientError::YamlDeserialization`] (naming the offending path inside the
    /// document) if it does not match the dataset schema.
    pub fn open(path: impl Into<PathBuf>) -> PatientResult<Self> {
        let path = path.into();
        let dataset = if path.exists() {
            let text = fs::read_to_string(&path).map_err(PatientError::FileRead)?;
            parse_dataset(&text)?
        } else {
            Dataset::new()
        };
        tracing::debug!(path = %path.display(), "opened YAML store");
        Ok(Self {
            path,
            inner: MemoryStore::with_dataset(dataset),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> PatientResult<Arc<Dataset>> {
        self.inner.snapshot()
    }

    fn persist(&self, dataset: &Dataset) -> PatientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(PatientError::StorageDirCreation)?;
        }

        let yaml = serde_yaml::to_string(dataset).map_err(PatientError::YamlSerialization)?;
        let tmp = temp_path(&self.path);
        fs::write(&tmp, yaml).map_err(PatientError::FileWrite)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(PatientError::FileWrite(e));
        }
        Ok(())
    }
}

impl Store for YamlFileStore {
    fn read<R>(&self, f: impl FnOnce(&Dataset) -> R) -> PatientResult<R> {
        self.inner.read(f)
    }

    fn transaction<R>(&self, f: impl FnOnce(&mut Dataset) -> PatientResult<R>) -> PatientResult<R> {
        self.inner.commit_with(f, |dataset| self.persist(dataset))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn parse_dataset(text: &str) -> PatientResult<Dataset> {
    if text.trim().is_empty() {
        return Ok(Dataset::new());
    }

    let deserializer = serde_yaml::Deserializer::from_str(text);
    serde_path_to_error::deserialize::<_, Dataset>(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() { "<root>" } else { path.as_str() };
        PatientError::YamlDeserialization(format!("dataset schema mismatch at {path}: {source}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Patient;
    use chrono::Utc;
    use fisio_types::NonEmptyText;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn patient() -> Patient {
        let now = Utc::now();
        Patient {
            id: Uuid::new_v4(),
            first_name: NonEmptyText::new("Elena").unwrap(),
            last_name: NonEmptyText::new("Ferrari").unwrap(),
            fiscal_code: Some("FRRLCU92S45A944E".into()),
            birth_date: None,
            gender: None,
            email: None,
            phone: None,
            address: None,
            city: Some("Bologna".into()),
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
    fn missing_file_opens_empty() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = YamlFileStore::open(dir.path().join("clinic.yaml")).expect("open");
        assert_eq!(store.read(|d| d.patients().count()).unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[test]
    fn reload_returns_what_was_committed() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("clinic.yaml");

        let store = YamlFileStore::open(&path).expect("open");
        store.transaction(|d| d.insert_patient(patient())).expect("commit");
        let committed = store.snapshot().unwrap();

        let reopened = YamlFileStore::open(&path).expect("reopen");
        assert_eq!(*reopened.snapshot().unwrap(), *committed);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn failed_transaction_does_not_touch_the_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("clinic.yaml");
        let store = YamlFileStore::open(&path).expect("open");
        store.transaction(|d| d.insert_patient(patient())).expect("commit");
        let before = fs::read_to_string(&path).expect("read");

        let result: PatientResult<()> = store.transaction(|d| {
            d.insert_patient(patient())?;
            Err(PatientError::InvalidInput("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).expect("read"), before);
    }

    #[test]
    fn failed_persist_keeps_memory_unchanged() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        // A directory where the data file should be makes the rename fail.
        let path = dir.path().join("clinic.yaml");
        fs::create_dir_all(path.join("occupied")).expect("Failed to create blocking dir");

        let store = YamlFileStore {
            path: path.clone(),
            inner: MemoryStore::new(),
        };
        let err = store.transaction(|d| d.insert_patient(patient())).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
        assert_eq!(store.read(|d| d.patients().count()).unwrap(), 0);
    }

    #[test]
    fn schema_mismatch_reports_path() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("clinic.yaml");
        fs::write(&path, "patients: 42\n").expect("write");

        let err = YamlFileStore::open(&path).unwrap_err();
        match err {
            PatientError::YamlDeserialization(msg) => assert!(msg.contains("patients"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
