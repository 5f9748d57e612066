use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::job::{JobDescriptor, JobId};

/// An ordered group of jobs executed one after another in a single slot
#[derive(Clone, Debug)]
pub struct Lane {
    pub index: usize,
    pub jobs: Vec<JobDescriptor>,
}

impl Lane {
    pub fn job_ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.jobs.iter().map(|j| j.id)
    }
}

/// What a backend knows about one job
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendStatus {
    /// Submitted, not started yet
    Pending,
    Running,

    /// Finished. The message is set if the job reported an error
    Exited(Option<String>),

    /// The backend has no record of the job
    Unknown,
}

/**
 * A place where lanes run. Submission returns as soon as the lane is handed
 * over; the jobs of a lane never run concurrently with each other.
 */
pub trait ExecutionBackend
where
    Self: Send + Debug,
{
    fn name(&self) -> &str;

    fn submit(&mut self, lane: &Lane) -> anyhow::Result<()>;

    fn poll(&self, job: JobId) -> BackendStatus;

    fn cancel(&mut self, job: JobId) -> anyhow::Result<()>;

    /// Give up observing. Backends running work inside this process wait for
    /// it here, since their work would otherwise die with the process
    fn detach(&mut self) {}
}

/// Job status shared between a backend and the threads executing its lanes
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    status: Arc<Mutex<HashMap<JobId, BackendStatus>>>,
}

impl StatusBoard {
    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, BackendStatus>> {
        //A panicking lane cannot leave the map half-updated
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set(&self, job: JobId, status: BackendStatus) {
        self.lock().insert(job, status);
    }

    pub fn get(&self, job: JobId) -> BackendStatus {
        self.lock().get(&job).cloned().unwrap_or(BackendStatus::Unknown)
    }
}
