use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use log::{debug, warn};
use threadpool::ThreadPool;

use crate::denoise::{run_job, DenoiseWorkflow};
use crate::job::JobId;

use super::{BackendStatus, ExecutionBackend, Lane, StatusBoard};

/// Runs lanes on a thread pool inside this process
#[derive(Debug)]
pub struct LocalBackend {
    workflow: Arc<dyn DenoiseWorkflow>,
    retain_temp_files: bool,
    thread_pool: ThreadPool,
    board: StatusBoard,
    cancelled: Arc<Mutex<HashSet<JobId>>>,
}

impl LocalBackend {
    pub fn new(workflow: Arc<dyn DenoiseWorkflow>, num_lanes: usize, retain_temp_files: bool) -> Self {
        LocalBackend {
            workflow,
            retain_temp_files,
            thread_pool: ThreadPool::new(num_lanes.max(1)),
            board: StatusBoard::default(),
            cancelled: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn submit(&mut self, lane: &Lane) -> anyhow::Result<()> {
        for id in lane.job_ids() {
            self.board.set(id, BackendStatus::Pending);
        }

        let jobs = lane.jobs.clone();
        let lane_index = lane.index;
        let workflow = Arc::clone(&self.workflow);
        let board = self.board.clone();
        let cancelled = Arc::clone(&self.cancelled);
        let retain_temp_files = self.retain_temp_files;

        self.thread_pool.execute(move || {
            debug!("Lane {} starting with {} job(s)", lane_index, jobs.len());
            for job in &jobs {
                if cancelled.lock().unwrap_or_else(|e| e.into_inner()).contains(&job.id) {
                    board.set(job.id, BackendStatus::Exited(Some("cancelled".to_string())));
                    continue;
                }
                board.set(job.id, BackendStatus::Running);

                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_job(job, workflow.as_ref(), retain_temp_files)
                }));
                let status = match result {
                    Ok(Ok(())) => BackendStatus::Exited(None),
                    Ok(Err(e)) => BackendStatus::Exited(Some(format!("{:#}", e))),
                    Err(payload) => {
                        let msg = panic_message(payload.as_ref());
                        warn!("Job {} panicked: {}", job.id, msg);
                        BackendStatus::Exited(Some(format!("panicked: {}", msg)))
                    }
                };
                board.set(job.id, status);
            }
            debug!("Lane {} done", lane_index);
        });
        Ok(())
    }

    fn poll(&self, job: JobId) -> BackendStatus {
        self.board.get(job)
    }

    fn cancel(&mut self, job: JobId) -> anyhow::Result<()> {
        match self.board.get(job) {
            BackendStatus::Pending => {
                self.cancelled
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(job);
                Ok(())
            }
            BackendStatus::Running => bail!("Job {} is running in-process and cannot be stopped", job),
            _ => Ok(()),
        }
    }

    fn detach(&mut self) {
        self.thread_pool.join();
    }
}
