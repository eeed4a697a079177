//! The shared job scheduler.

use queue_core::{ClientId, Job, JobId, Priority, SchedulerError, SchedulerResult};
use tokio::sync::{Mutex, Notify};

use crate::state::{Assignment, SchedulerState, SchedulerStats};

/// Owns every queue and serializes all operations on them.
///
/// A single lock covers the queue map. Connections blocked in
/// [`JobScheduler::get`] wait on `available` with the lock released and
/// re-scan from scratch after each wake-up. Anything that can make a job
/// ready (`put`, `abort`, `disconnect`) wakes all of them at once; whichever
/// reacquires the lock first takes the job and the rest go back to sleep.
#[derive(Debug, Default)]
pub struct JobScheduler {
    state: Mutex<SchedulerState>,
    available: Notify,
}

impl JobScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a job and wake every blocked `get`.
    pub async fn put(
        &self,
        queue: &str,
        payload: serde_json::Value,
        priority: Priority,
    ) -> JobId {
        let mut state = self.state.lock().await;
        let id = state.insert(queue, payload, priority);
        tracing::debug!("Put job {} into queue {} with priority {}", id, queue, priority);

        self.available.notify_waiters();
        id
    }

    /// Assign the best ready job from `queues` to `client`.
    ///
    /// With `wait` set, suspends until a job becomes available in one of the
    /// queues. Dropping the returned future while it waits leaves no trace.
    pub async fn get<S>(
        &self,
        queues: &[S],
        wait: bool,
        client: ClientId,
    ) -> SchedulerResult<Assignment>
    where
        S: AsRef<str> + Sync,
    {
        if queues.is_empty() {
            return Err(SchedulerError::NoQueues);
        }

        loop {
            let mut state = self.state.lock().await;

            // Register for wake-ups before scanning so that a put landing
            // between the unlock below and the await is not missed.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(assignment) = state.assign_best(queues, client) {
                tracing::debug!(
                    "Got job {} from queue {} with priority {} for {}",
                    assignment.job.id,
                    assignment.queue,
                    assignment.job.priority,
                    client
                );
                return Ok(assignment);
            }

            if !wait {
                return Err(SchedulerError::NoJob);
            }

            drop(state);
            notified.await;
        }
    }

    /// Non-blocking [`JobScheduler::get`].
    pub async fn try_get<S>(&self, queues: &[S], client: ClientId) -> SchedulerResult<Assignment>
    where
        S: AsRef<str> + Sync,
    {
        self.get(queues, false, client).await
    }

    /// Return an assigned job to its queue.
    ///
    /// Fails with [`SchedulerError::JobNotFound`] unless `client` holds the job.
    pub async fn abort(&self, id: JobId, client: ClientId) -> SchedulerResult<()> {
        let mut state = self.state.lock().await;
        let job = state.abort(id, client)?;
        tracing::debug!("Aborted job {} in queue {} by {}", id, job.queue, client);

        self.available.notify_waiters();
        Ok(())
    }

    /// Remove a job permanently, whatever its state or owner.
    pub async fn delete(&self, id: JobId) -> SchedulerResult<()> {
        let mut state = self.state.lock().await;
        let job = state.delete(id)?;
        tracing::debug!("Deleted job {} from queue {}", id, job.queue);
        Ok(())
    }

    /// Release every job held by a closing connection.
    ///
    /// Returns how many jobs went back to their queues.
    pub async fn disconnect(&self, client: ClientId) -> usize {
        let mut state = self.state.lock().await;
        let released = state.release_all(client);

        if !released.is_empty() {
            tracing::info!("Released {} job(s) held by {}: {:?}", released.len(), client, released);
            self.available.notify_waiters();
        }
        released.len()
    }

    /// Copy of a live job.
    pub async fn job(&self, id: JobId) -> Option<Job> {
        self.state.lock().await.job(id).cloned()
    }

    /// Current per-queue counts.
    pub async fn stats(&self) -> SchedulerStats {
        self.state.lock().await.stats()
    }
}
