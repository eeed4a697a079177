//! Scheduling state guarded by the scheduler lock.

use std::collections::{BTreeMap, HashMap};

use queue_core::{
    ClientId, Job, JobId, Priority, PriorityQueue, QueueStats, SchedulerError, SchedulerResult,
};
use serde::{Deserialize, Serialize};

/// A job handed to a connection, with the queue it was served from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub job: Job,
    pub queue: String,
}

/// Point-in-time counts for every known queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Stats by queue name.
    pub queues: BTreeMap<String, QueueStats>,
    /// Last job id handed out, zero if none.
    pub last_id: JobId,
}

impl SchedulerStats {
    pub fn ready(&self) -> u64 {
        self.queues.values().map(|q| q.ready).sum()
    }

    pub fn assigned(&self) -> u64 {
        self.queues.values().map(|q| q.assigned).sum()
    }

    pub fn total(&self) -> u64 {
        self.queues.values().map(QueueStats::total).sum()
    }
}

/// Queue map, job locations and the id counter.
///
/// Every method runs to completion without awaiting, so callers holding the
/// lock never observe a half-applied change.
#[derive(Debug, Default)]
pub(crate) struct SchedulerState {
    queues: HashMap<String, PriorityQueue>,
    /// Queue name for every live job id.
    locations: HashMap<JobId, String>,
    last_id: JobId,
}

impl SchedulerState {
    pub(crate) fn insert(
        &mut self,
        queue: &str,
        payload: serde_json::Value,
        priority: Priority,
    ) -> JobId {
        let id = self.last_id.next();
        self.last_id = id;

        self.queues
            .entry(queue.to_owned())
            .or_default()
            .push(Job::new(id, queue, payload, priority));
        self.locations.insert(id, queue.to_owned());
        id
    }

    /// Assign the highest-priority ready job across `names` to `client`.
    ///
    /// On equal priority the queue listed first wins.
    pub(crate) fn assign_best<S: AsRef<str>>(
        &mut self,
        names: &[S],
        client: ClientId,
    ) -> Option<Assignment> {
        let mut best: Option<(&str, JobId, Priority)> = None;
        for name in names {
            let name = name.as_ref();
            let Some(top) = self.queues.get(name).and_then(PriorityQueue::peek_best) else {
                continue;
            };
            // The root is only assigned when the whole queue is.
            if !top.is_ready() {
                continue;
            }
            if best.is_none_or(|(_, _, priority)| top.priority > priority) {
                best = Some((name, top.id, top.priority));
            }
        }

        let (name, id, _) = best?;
        let queue = self.queues.get_mut(name)?;
        let job = queue.get_mut(id)?;
        job.assign(client);
        let job = job.clone();
        queue.fix(id);

        Some(Assignment {
            job,
            queue: name.to_owned(),
        })
    }

    pub(crate) fn abort(&mut self, id: JobId, client: ClientId) -> SchedulerResult<Job> {
        let name = self
            .locations
            .get(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;
        let queue = self
            .queues
            .get_mut(name)
            .ok_or(SchedulerError::JobNotFound(id))?;
        let job = queue
            .get_mut(id)
            .filter(|job| job.is_owned_by(client))
            .ok_or(SchedulerError::JobNotFound(id))?;

        job.release();
        let job = job.clone();
        queue.fix(id);
        Ok(job)
    }

    pub(crate) fn delete(&mut self, id: JobId) -> SchedulerResult<Job> {
        let name = self
            .locations
            .remove(&id)
            .ok_or(SchedulerError::JobNotFound(id))?;
        let queue = self
            .queues
            .get_mut(&name)
            .ok_or(SchedulerError::JobNotFound(id))?;
        let job = queue.remove(id).ok_or(SchedulerError::JobNotFound(id))?;

        if queue.is_empty() {
            self.queues.remove(&name);
        }
        Ok(job)
    }

    /// Return every job held by `client` to the ready pool.
    pub(crate) fn release_all(&mut self, client: ClientId) -> Vec<JobId> {
        let mut released = Vec::new();
        for queue in self.queues.values_mut() {
            for id in queue.owned_by(client) {
                if let Some(job) = queue.get_mut(id) {
                    job.release();
                }
                queue.fix(id);
                released.push(id);
            }
        }
        released.sort();
        released
    }

    pub(crate) fn job(&self, id: JobId) -> Option<&Job> {
        let name = self.locations.get(&id)?;
        self.queues.get(name)?.get(id)
    }

    pub(crate) fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queues: self
                .queues
                .iter()
                .map(|(name, queue)| (name.clone(), queue.stats()))
                .collect(),
            last_id: self.last_id,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use serde_json::json;

    #[test]
    fn ids_increase_across_queues() {
        let mut state = SchedulerState::default();
        let a = state.insert("a", json!(1), Priority(1));
        let b = state.insert("b", json!(2), Priority(1));
        let c = state.insert("a", json!(3), Priority(1));
        assert_eq!((a, b, c), (JobId(1), JobId(2), JobId(3)));
    }

    #[test]
    fn ties_go_to_the_first_listed_queue() {
        let mut state = SchedulerState::default();
        state.insert("a", json!("a"), Priority(5));
        state.insert("b", json!("b"), Priority(5));

        let got = state.assign_best(&["b", "a"], ClientId(1)).unwrap();
        assert_eq!(got.queue, "b");
        let got = state.assign_best(&["b", "a"], ClientId(1)).unwrap();
        assert_eq!(got.queue, "a");
        assert!(state.assign_best(&["b", "a"], ClientId(1)).is_none());
    }

    #[test]
    fn deleting_the_last_job_drops_the_queue() {
        let mut state = SchedulerState::default();
        let id = state.insert("q", json!(null), Priority(0));
        assert_eq!(state.stats().queues.len(), 1);

        state.delete(id).unwrap();
        assert!(state.stats().queues.is_empty());
        assert_eq!(state.stats().last_id, id);
        assert_eq!(state.delete(id), Err(SchedulerError::JobNotFound(id)));

        // The counter is not rewound by deletes.
        assert_eq!(state.insert("q", json!(null), Priority(0)), JobId(2));
    }

    #[test]
    fn release_all_only_touches_the_owner() {
        let mut state = SchedulerState::default();
        for queue in ["a", "b", "a"] {
            state.insert(queue, json!(null), Priority(1));
        }
        state.assign_best(&["a"], ClientId(1)).unwrap();
        state.assign_best(&["b"], ClientId(1)).unwrap();
        state.assign_best(&["a"], ClientId(2)).unwrap();

        let released = state.release_all(ClientId(1));
        assert_eq!(released.len(), 2);
        let stats = state.stats();
        assert_eq!(stats.ready(), 2);
        assert_eq!(stats.assigned(), 1);
    }
}
