//! Per-queue priority heap.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ClientId, Job, JobId};

/// Counts of jobs in a single queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    /// Jobs waiting to be handed out.
    pub ready: u64,
    /// Jobs currently held by a connection.
    pub assigned: u64,
}

impl QueueStats {
    /// Total jobs in the queue.
    pub fn total(&self) -> u64 {
        self.ready + self.assigned
    }
}

/// Returns true if `a` should come out of the heap before `b`.
///
/// Ready jobs always precede assigned ones; within the same state the higher
/// priority wins. Equal priorities have no defined order.
fn precedes(a: &Job, b: &Job) -> bool {
    match (a.is_ready(), b.is_ready()) {
        (true, false) => true,
        (false, true) => false,
        _ => a.priority > b.priority,
    }
}

/// Binary max-heap of jobs with position tracking.
///
/// Jobs are stored by value in a `Vec`; `positions` maps each id to its
/// current slot so that a job can be re-ordered or removed in O(log n)
/// after an in-place change.
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    jobs: Vec<Job>,
    positions: HashMap<JobId, usize>,
}

impl PriorityQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Insert a job.
    pub fn push(&mut self, job: Job) {
        let index = self.jobs.len();
        self.positions.insert(job.id, index);
        self.jobs.push(job);
        self.sift_up(index);
        debug_assert!(self.is_valid());
    }

    /// The job that would be handed out next, if any.
    ///
    /// This may be an assigned job when the queue has no ready ones.
    pub fn peek_best(&self) -> Option<&Job> {
        self.jobs.first()
    }

    /// Current heap slot of a job.
    pub fn index_of(&self, id: JobId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.index_of(id).map(|index| &self.jobs[index])
    }

    /// Mutable access to a job in place.
    ///
    /// After changing `state` or `priority`, call [`PriorityQueue::fix`]
    /// with the same id to restore heap order.
    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        let index = self.index_of(id)?;
        Some(&mut self.jobs[index])
    }

    /// Restore heap order around a job whose state or priority changed.
    ///
    /// Returns false if the job is not in this queue.
    pub fn fix(&mut self, id: JobId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.fix_at(index);
        debug_assert!(self.is_valid());
        true
    }

    /// Remove the job stored at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<Job> {
        if index >= self.jobs.len() {
            return None;
        }

        let last = self.jobs.len() - 1;
        if index != last {
            self.swap(index, last);
        }

        let job = self.jobs.pop()?;
        self.positions.remove(&job.id);

        if index < self.jobs.len() {
            self.fix_at(index);
        }
        debug_assert!(self.is_valid());
        Some(job)
    }

    /// Remove a job by id.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let index = self.index_of(id)?;
        self.remove_at(index)
    }

    /// Jobs in heap order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Ids of every job held by `client`.
    pub fn owned_by(&self, client: ClientId) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|job| job.is_owned_by(client))
            .map(|job| job.id)
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        let ready = self.jobs.iter().filter(|job| job.is_ready()).count() as u64;
        QueueStats {
            ready,
            assigned: self.jobs.len() as u64 - ready,
        }
    }

    fn fix_at(&mut self, index: usize) {
        if !self.sift_down(index) {
            self.sift_up(index);
        }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.jobs.swap(i, j);
        self.positions.insert(self.jobs[i].id, i);
        self.positions.insert(self.jobs[j].id, j);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !precedes(&self.jobs[index], &self.jobs[parent]) {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    /// Returns true if the job moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let len = self.jobs.len();
        let mut index = start;
        loop {
            let left = 2 * index + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut best = left;
            if right < len && precedes(&self.jobs[right], &self.jobs[left]) {
                best = right;
            }
            if !precedes(&self.jobs[best], &self.jobs[index]) {
                break;
            }
            self.swap(index, best);
            index = best;
        }
        index > start
    }

    fn is_valid(&self) -> bool {
        if self.positions.len() != self.jobs.len() {
            return false;
        }
        self.jobs.iter().enumerate().all(|(index, job)| {
            let tracked = self.positions.get(&job.id) == Some(&index);
            let ordered = index == 0 || !precedes(job, &self.jobs[(index - 1) / 2]);
            tracked && ordered
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;
    use crate::Priority;
    use serde_json::json;

    fn job(id: u64, priority: u64) -> Job {
        Job::new(JobId(id), "q", json!({ "n": id }), Priority(priority))
    }

    fn drain_ids(queue: &mut PriorityQueue) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(best) = queue.peek_best() {
            let id = best.id;
            queue.remove(id);
            ids.push(id.0);
        }
        ids
    }

    #[test]
    fn empty_queue_has_no_best() {
        let mut queue = PriorityQueue::new();
        assert!(queue.peek_best().is_none());
        assert!(queue.remove_at(0).is_none());
        assert!(!queue.fix(JobId(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn highest_priority_comes_first() {
        let mut queue = PriorityQueue::new();
        for (id, pri) in [(1, 5), (2, 10), (3, 1), (4, 7), (5, 3)] {
            queue.push(job(id, pri));
        }
        assert_eq!(queue.peek_best().map(|j| j.id), Some(JobId(2)));
        assert_eq!(drain_ids(&mut queue), vec![2, 4, 1, 5, 3]);
    }

    #[test]
    fn assigned_jobs_sink_below_ready_ones() {
        let mut queue = PriorityQueue::new();
        queue.push(job(1, 100));
        queue.push(job(2, 1));

        let top = queue.get_mut(JobId(1)).unwrap();
        top.assign(ClientId(9));
        assert!(queue.fix(JobId(1)));
        assert_eq!(queue.peek_best().map(|j| j.id), Some(JobId(2)));

        queue.get_mut(JobId(2)).unwrap().assign(ClientId(9));
        queue.fix(JobId(2));
        // Only assigned jobs left: the root is still one of them.
        assert!(!queue.peek_best().unwrap().is_ready());

        queue.get_mut(JobId(1)).unwrap().release();
        queue.fix(JobId(1));
        assert_eq!(queue.peek_best().map(|j| j.id), Some(JobId(1)));
    }

    #[test]
    fn remove_from_the_middle_keeps_order() {
        let mut queue = PriorityQueue::new();
        for id in 1..=20 {
            queue.push(job(id, (id * 7) % 13));
        }
        let removed = queue.remove(JobId(11)).unwrap();
        assert_eq!(removed.id, JobId(11));
        assert_eq!(queue.index_of(JobId(11)), None);
        assert_eq!(queue.len(), 19);

        let drained = drain_ids(&mut queue);
        let priorities: Vec<u64> = drained.iter().map(|id| (id * 7) % 13).collect();
        assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn positions_follow_swaps() {
        let mut queue = PriorityQueue::new();
        for id in 1..=8 {
            queue.push(job(id, id));
        }
        for id in 1..=8 {
            let index = queue.index_of(JobId(id)).unwrap();
            assert_eq!(queue.iter().nth(index).map(|j| j.id), Some(JobId(id)));
        }
        assert_eq!(queue.index_of(JobId(8)), Some(0));
    }

    #[test]
    fn stats_and_ownership() {
        let mut queue = PriorityQueue::new();
        for id in 1..=4 {
            queue.push(job(id, id));
        }
        for id in [2, 3] {
            queue.get_mut(JobId(id)).unwrap().assign(ClientId(1));
            queue.fix(JobId(id));
        }
        queue.get_mut(JobId(4)).unwrap().assign(ClientId(2));
        queue.fix(JobId(4));

        let stats = queue.stats();
        assert_eq!(stats.ready, 1);
        assert_eq!(stats.assigned, 3);
        assert_eq!(stats.total(), 4);

        let mut owned = queue.owned_by(ClientId(1));
        owned.sort();
        assert_eq!(owned, vec![JobId(2), JobId(3)]);
    }
}
