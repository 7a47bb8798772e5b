use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::job::{Job, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted and confirmed on the inbound topic. The gateway never learns
    /// anything after this point.
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    pub payload: Job,
}

/// Bounded map of job id to status, owned by one gateway instance.
///
/// When full, the oldest entry is evicted first.
#[derive(Debug)]
pub struct StatusStore {
    entries: HashMap<JobId, JobStatus>,
    order: VecDeque<JobId>,
    capacity: usize,
}

impl StatusStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&mut self, job_id: JobId, status: JobStatus) {
        if self.entries.insert(job_id.clone(), status).is_none() {
            self.order.push_back(job_id);
        }

        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn get(&self, job_id: &JobId) -> Option<&JobStatus> {
        self.entries.get(job_id)
    }

    pub fn remove(&mut self, job_id: &JobId) -> Option<JobStatus> {
        let removed = self.entries.remove(job_id)?;
        self.order.retain(|id| id != job_id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobAttributes;

    fn submitted(id: &str) -> (JobId, JobStatus) {
        let job = Job::with_id(JobId::from(id), JobAttributes::new(1, 1, 0), 0);
        (
            job.job_id.clone(),
            JobStatus {
                state: JobState::Submitted,
                payload: job,
            },
        )
    }

    #[test]
    fn insert_and_get() {
        let mut store = StatusStore::new(10);
        let (id, status) = submitted("a");
        store.insert(id.clone(), status.clone());

        assert_eq!(store.get(&id), Some(&status));
        assert!(store.get(&JobId::from("missing")).is_none());
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut store = StatusStore::new(2);
        for id in ["a", "b", "c"] {
            let (id, status) = submitted(id);
            store.insert(id, status);
        }

        assert_eq!(store.len(), 2);
        assert!(store.get(&JobId::from("a")).is_none());
        assert!(store.get(&JobId::from("b")).is_some());
        assert!(store.get(&JobId::from("c")).is_some());
    }

    #[test]
    fn remove_forgets_order() {
        let mut store = StatusStore::new(2);
        let (a, status_a) = submitted("a");
        let (b, status_b) = submitted("b");
        store.insert(a.clone(), status_a);
        store.insert(b.clone(), status_b);
        assert!(store.remove(&a).is_some());

        let (c, status_c) = submitted("c");
        store.insert(c.clone(), status_c);

        // "b" survives because "a" no longer counts towards capacity.
        assert!(store.get(&b).is_some());
        assert!(store.get(&c).is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn state_serializes_lowercase() {
        let (_, status) = submitted("a");
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "submitted");
        assert_eq!(value["payload"]["jobId"], "a");
    }

    #[test]
    fn clear_empties_store() {
        let mut store = StatusStore::new(4);
        let (id, status) = submitted("a");
        store.insert(id, status);
        store.clear();
        assert!(store.is_empty());
    }
}
