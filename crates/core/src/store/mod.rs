//! Persistence port.
//!
//! All clinic data lives in one [`Dataset`]. A [`Store`] hands out shared read access to
//! the current dataset and runs mutations as transactions: the closure works on a private
//! copy, and the copy replaces the current dataset only if the closure returns `Ok` (and,
//! for durable stores, only once it has been written out).

mod dataset;
mod memory;
mod yaml;

pub use dataset::Dataset;
pub use memory::MemoryStore;
pub use yaml::YamlFileStore;

use crate::PatientResult;

pub trait Store: Send + Sync {
    /// Runs `f` against a consistent snapshot. Concurrent readers do not block each other.
    fn read<R>(&self, f: impl FnOnce(&Dataset) -> R) -> PatientResult<R>;

    /// Runs `f` with exclusive write access. On `Err` nothing is published.
    fn transaction<R>(&self, f: impl FnOnce(&mut Dataset) -> PatientResult<R>) -> PatientResult<R>;
}
