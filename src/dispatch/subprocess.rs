use std::collections::{HashMap, HashSet};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use crossbeam::channel::{Receiver, Sender};
use log::{debug, warn};

use crate::denoise::DenoiseInvocation;
use crate::job::{JobDescriptor, JobId};
use crate::runtime::Error;
use crate::utils::command_to_string;

use super::{BackendStatus, ExecutionBackend, Lane, StatusBoard};

#[derive(Debug, Default)]
struct ChildRegistry {
    pids: HashMap<JobId, u32>,
    cancelled: HashSet<JobId>,
}

/// Signals from lane threads that they are done
#[derive(Debug)]
struct LaneGroup {
    tx_done: Sender<usize>,
    rx_done: Receiver<usize>,
    num_started: usize,
}

impl LaneGroup {
    fn new() -> LaneGroup {
        let (tx_done, rx_done) = crossbeam::channel::unbounded::<usize>();
        LaneGroup {
            tx_done,
            rx_done,
            num_started: 0,
        }
    }

    fn join(&mut self) {
        while self.num_started > 0 {
            match self.rx_done.recv() {
                Ok(lane) => debug!("Lane {} joined", lane),
                Err(_) => break,
            }
            self.num_started -= 1;
        }
    }
}

/**
 * Runs every job as a child process `<exe> denoise ...`. One thread per lane
 * starts the children of its lane one after the other.
 */
#[derive(Debug)]
pub struct SubprocessBackend {
    invocation: DenoiseInvocation,
    board: StatusBoard,
    children: Arc<Mutex<ChildRegistry>>,
    lanes: LaneGroup,
}

impl SubprocessBackend {
    pub fn new(invocation: DenoiseInvocation) -> Self {
        SubprocessBackend {
            invocation,
            board: StatusBoard::default(),
            children: Arc::new(Mutex::new(ChildRegistry::default())),
            lanes: LaneGroup::new(),
        }
    }
}

fn run_child(
    invocation: &DenoiseInvocation,
    job: &JobDescriptor,
    children: &Mutex<ChildRegistry>,
) -> anyhow::Result<BackendStatus> {
    let mut cmd: Command = invocation.command(job)?;
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let cmd_string = command_to_string(&cmd);
    debug!("Running {}", cmd_string);

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to start {}", cmd_string))?;
    children
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pids
        .insert(job.id, child.id());

    let output = child.wait_with_output()?;
    children
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pids
        .remove(&job.id);

    if output.status.success() {
        Ok(BackendStatus::Exited(None))
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr.trim().lines().last().unwrap_or("").to_string();
        let err = Error::utility_execution_error(
            invocation.exe.display().to_string(),
            cmd_string,
            Some(format!("{}; {}", output.status, last_line)),
        );
        Ok(BackendStatus::Exited(Some(err.to_string())))
    }
}

impl ExecutionBackend for SubprocessBackend {
    fn name(&self) -> &str {
        "subprocess"
    }

    fn submit(&mut self, lane: &Lane) -> anyhow::Result<()> {
        for id in lane.job_ids() {
            self.board.set(id, BackendStatus::Pending);
        }

        let jobs = lane.jobs.clone();
        let lane_index = lane.index;
        let invocation = self.invocation.clone();
        let board = self.board.clone();
        let children = Arc::clone(&self.children);
        let tx_done = self.lanes.tx_done.clone();

        thread::Builder::new()
            .name(format!("lane-{}", lane_index))
            .spawn(move || {
                for job in &jobs {
                    let is_cancelled = children
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .cancelled
                        .contains(&job.id);
                    if is_cancelled {
                        board.set(job.id, BackendStatus::Exited(Some("cancelled".to_string())));
                        continue;
                    }

                    board.set(job.id, BackendStatus::Running);
                    let status = run_child(&invocation, job, &children)
                        .unwrap_or_else(|e| BackendStatus::Exited(Some(format!("{:#}", e))));
                    board.set(job.id, status);
                }
                _ = tx_done.send(lane_index);
            })
            .with_context(|| format!("Failed to start thread for lane {}", lane_index))?;

        self.lanes.num_started += 1;
        Ok(())
    }

    fn poll(&self, job: JobId) -> BackendStatus {
        self.board.get(job)
    }

    fn cancel(&mut self, job: JobId) -> anyhow::Result<()> {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.cancelled.insert(job);

        if let Some(pid) = children.pids.get(&job) {
            let status = Command::new("kill")
                .arg(pid.to_string())
                .status()
                .context("Failed to run kill")?;
            if !status.success() {
                warn!("kill {} for job {} exited with {}", pid, job, status);
            }
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.lanes.join();
    }
}
