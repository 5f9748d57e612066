use std::collections::HashMap;

use anyhow::bail;
use log::{debug, info, warn};

use crate::job::{JobDescriptor, JobHandle, JobId, JobState};
use crate::runtime::Error;
use crate::utils::artifact_is_complete;

use super::{BackendStatus, ExecutionBackend, Lane};

/**
 * Spread jobs round-robin over at most `jobs_to_start` lanes. Job i goes to
 * lane i % num_lanes, so lanes differ in length by at most one. A
 * `jobs_to_start` of 0 is taken as 1.
 */
pub fn plan_lanes(jobs: Vec<JobDescriptor>, jobs_to_start: usize) -> Vec<Lane> {
    let num_lanes = jobs_to_start.max(1).min(jobs.len());
    let mut lanes: Vec<Lane> = (0..num_lanes)
        .map(|index| Lane {
            index,
            jobs: Vec::new(),
        })
        .collect();
    for (i, job) in jobs.into_iter().enumerate() {
        lanes[i % num_lanes].jobs.push(job);
    }
    lanes
}

/// Owns the handles of all jobs of a run and keeps them in sync with the backend
#[derive(Debug)]
pub struct Dispatcher {
    backend: Box<dyn ExecutionBackend>,
    jobs_to_start: usize,
    handles: Vec<JobHandle>,
    index_of: HashMap<JobId, usize>,
    lanes: Vec<Vec<JobId>>,
}

impl Dispatcher {
    pub fn new(backend: Box<dyn ExecutionBackend>, jobs_to_start: usize) -> anyhow::Result<Self> {
        if jobs_to_start < 1 {
            return Err(Error::invalid_parameter("jobs-to-start", "must be at least 1").into());
        }
        Ok(Dispatcher {
            backend,
            jobs_to_start,
            handles: Vec::new(),
            index_of: HashMap::new(),
            lanes: Vec::new(),
        })
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Submit every job and return without waiting. A lane that cannot be
    /// submitted has its jobs marked Failed
    pub fn dispatch(&mut self, jobs: Vec<JobDescriptor>) -> anyhow::Result<()> {
        if !self.handles.is_empty() {
            bail!("Jobs were already dispatched");
        }

        for job in &jobs {
            if self.index_of.insert(job.id, self.handles.len()).is_some() {
                bail!("Job id {} is used twice", job.id);
            }
            self.handles.push(JobHandle::new(job));
        }

        let lanes = plan_lanes(jobs, self.jobs_to_start);
        info!(
            "Dispatching {} job(s) in {} lane(s) on the {} backend",
            self.handles.len(),
            lanes.len(),
            self.backend.name()
        );

        for lane in lanes {
            self.lanes.push(lane.job_ids().collect());
            if let Err(e) = self.backend.submit(&lane) {
                let msg = format!("submission of lane {} failed: {:#}", lane.index, e);
                warn!("{}", msg);
                for id in lane.job_ids() {
                    self.handle_mut(id).advance(JobState::Failed, Some(msg.clone()));
                }
            }
        }
        Ok(())
    }

    fn handle_mut(&mut self, id: JobId) -> &mut JobHandle {
        let i = self.index_of[&id];
        &mut self.handles[i]
    }

    /**
     * Poll the backend for every unfinished job and apply the transitions.
     * Each lane is polled from its last job to its first: a later job found
     * started implies every earlier one had finished at that moment, so two
     * jobs of a lane are never seen running together.
     */
    pub fn refresh(&mut self) {
        let lanes = std::mem::take(&mut self.lanes);
        for lane in &lanes {
            for &id in lane.iter().rev() {
                if self.handle_mut(id).is_terminal() {
                    continue;
                }
                let status = self.backend.poll(id);
                self.apply(id, status);
            }
        }
        self.lanes = lanes;
    }

    fn apply(&mut self, id: JobId, status: BackendStatus) {
        let handle = self.handle_mut(id);
        let changed = match status {
            BackendStatus::Pending => false,
            BackendStatus::Running => handle.advance(JobState::Running, None),
            BackendStatus::Exited(Some(msg)) => handle.advance(JobState::Failed, Some(msg)),
            BackendStatus::Exited(None) => {
                if artifact_is_complete(&handle.artifact_path) {
                    handle.advance(JobState::Succeeded, None)
                } else {
                    let msg = format!("no output at {}", handle.artifact_path.display());
                    handle.advance(JobState::Failed, Some(msg))
                }
            }
            BackendStatus::Unknown => {
                debug!("Backend has no record of job {}", id);
                false
            }
        };
        if changed {
            match handle.message() {
                Some(msg) => info!("Job {} ({}): {}, {}", handle.id, handle.sample, handle.state(), msg),
                None => info!("Job {} ({}): {}", handle.id, handle.sample, handle.state()),
            }
        }
    }

    pub fn handles(&self) -> &[JobHandle] {
        &self.handles
    }

    pub fn running_count(&self) -> usize {
        self.handles
            .iter()
            .filter(|h| h.state() == JobState::Running)
            .count()
    }

    pub fn all_terminal(&self) -> bool {
        self.handles.iter().all(|h| h.is_terminal())
    }

    /// Ask the backend to stop every unfinished job. Returns how many requests
    /// the backend accepted
    pub fn cancel_outstanding(&mut self) -> usize {
        let outstanding: Vec<JobId> = self
            .handles
            .iter()
            .filter(|h| !h.is_terminal())
            .map(|h| h.id)
            .collect();

        let mut num_cancelled = 0;
        for id in outstanding {
            match self.backend.cancel(id) {
                Ok(()) => num_cancelled += 1,
                Err(e) => warn!("Could not cancel job {}: {:#}", id, e),
            }
        }
        num_cancelled
    }

    /// Stop observing; see [`ExecutionBackend::detach`]
    pub fn detach(&mut self) {
        self.backend.detach();
    }
}
