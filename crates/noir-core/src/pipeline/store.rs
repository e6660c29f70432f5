//! Keyed job collection with atomic per-job updates.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::job::ImageJob;
use crate::types::JobId;

/// All jobs of one pipeline, ordered by id (creation order).
///
/// Every access takes the lock for the duration of a closure only; callers
/// never hold it across an await.
pub(crate) struct JobStore {
    jobs: Mutex<BTreeMap<JobId, ImageJob>>,
    next_id: AtomicU64,
}

impl JobStore {
    pub(crate) fn new() -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<JobId, ImageJob>> {
        // A panic inside an update closure leaves the map itself intact.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allocate an id. Ids are never reused, even across `clear`.
    pub(crate) fn allocate_id(&self) -> JobId {
        JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn insert(&self, job: ImageJob) {
        self.lock().insert(job.id(), job);
    }

    /// Apply `f` to one job. Returns `None` when the id is unknown.
    pub(crate) fn update<R>(&self, id: JobId, f: impl FnOnce(&mut ImageJob) -> R) -> Option<R> {
        self.lock().get_mut(&id).map(f)
    }

    pub(crate) fn read<R>(&self, id: JobId, f: impl FnOnce(&ImageJob) -> R) -> Option<R> {
        self.lock().get(&id).map(f)
    }

    /// Run `f` against the whole collection under one lock.
    pub(crate) fn with_all<R>(&self, f: impl FnOnce(&BTreeMap<JobId, ImageJob>) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn get(&self, id: JobId) -> Option<ImageJob> {
        self.read(id, ImageJob::clone)
    }

    pub(crate) fn all(&self) -> Vec<ImageJob> {
        self.lock().values().cloned().collect()
    }

    pub(crate) fn clear(&self) -> usize {
        let mut jobs = self.lock();
        let count = jobs.len();
        jobs.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageFile, JobState};

    fn job(store: &JobStore) -> ImageJob {
        ImageJob::new(
            store.allocate_id(),
            ImageFile::new("a.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]),
        )
    }

    #[test]
    fn test_ids_are_monotonic_across_clear() {
        let store = JobStore::new();
        let a = store.allocate_id();
        let b = store.allocate_id();
        store.clear();
        let c = store.allocate_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let store = JobStore::new();
        let j = job(&store);
        let id = j.id();
        store.insert(j);
        assert_eq!(store.clear(), 1);

        let applied = store.update(id, |job| job.no_faces_found());
        assert!(applied.is_none());
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_all_in_creation_order() {
        let store = JobStore::new();
        let first = job(&store);
        let second = job(&store);
        let (first_id, second_id) = (first.id(), second.id());
        store.insert(second);
        store.insert(first);

        let ids: Vec<_> = store.all().iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec![first_id, second_id]);
    }

    #[test]
    fn test_update_mutates_in_place() {
        let store = JobStore::new();
        let j = job(&store);
        let id = j.id();
        store.insert(j);

        store.update(id, |job| job.no_faces_found()).unwrap().unwrap();
        assert_eq!(store.read(id, |job| job.state()), Some(JobState::Ready));
    }
}
