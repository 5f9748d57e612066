use std::fmt;
use std::path::PathBuf;

use super::{JobDescriptor, JobId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    fn rank(&self) -> u8 {
        match self {
            JobState::Queued => 0,
            JobState::Running => 1,
            JobState::Succeeded | JobState::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Runtime record of one dispatched job
#[derive(Clone, Debug)]
pub struct JobHandle {
    pub id: JobId,
    pub sample: String,
    pub artifact_path: PathBuf,
    state: JobState,
    message: Option<String>,
}

impl JobHandle {
    pub fn new(job: &JobDescriptor) -> Self {
        JobHandle {
            id: job.id,
            sample: job.sample().to_string(),
            artifact_path: job.artifact_path.clone(),
            state: JobState::Queued,
            message: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Why the job failed, if it did
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move forward to a later state. Going back, staying, or leaving a
    /// terminal state is ignored; returns whether the state changed
    pub fn advance(&mut self, next: JobState, message: Option<String>) -> bool {
        if next.rank() <= self.state.rank() {
            return false;
        }
        self.state = next;
        if message.is_some() {
            self.message = message;
        }
        true
    }
}
