use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use itertools::Itertools;
use log::{info, warn};

use crate::job::{JobHandle, JobState};

/// Final word on one job, as far as this run observed it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),

    /// Still unfinished when the timeout elapsed; the job itself was not stopped
    TimedOut,

    /// Not observed to the end because polling was suppressed
    Pending,
}

impl JobOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed(_) => "failed",
            JobOutcome::TimedOut => "timed_out",
            JobOutcome::Pending => "pending",
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobOutcome::Failed(msg) => write!(f, "failed: {}", msg),
            other => write!(f, "{}", other.label()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleOutcome {
    pub sample: String,
    pub artifact_path: PathBuf,
    pub outcome: JobOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    outcomes: Vec<SampleOutcome>,
}

impl RunSummary {
    /// Terminal handles map to their state; the rest get `unfinished`
    pub fn from_handles(handles: &[JobHandle], unfinished: JobOutcome) -> RunSummary {
        let outcomes = handles
            .iter()
            .map(|h| SampleOutcome {
                sample: h.sample.clone(),
                artifact_path: h.artifact_path.clone(),
                outcome: match h.state() {
                    JobState::Succeeded => JobOutcome::Succeeded,
                    JobState::Failed => {
                        JobOutcome::Failed(h.message().unwrap_or("unknown error").to_string())
                    }
                    JobState::Queued | JobState::Running => unfinished.clone(),
                },
            })
            .collect();
        RunSummary { outcomes }
    }

    pub fn outcomes(&self) -> &[SampleOutcome] {
        &self.outcomes
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome == JobOutcome::Succeeded)
    }

    pub fn samples_with(&self, label: &str) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.label() == label)
            .map(|o| o.sample.as_str())
            .collect()
    }

    pub fn log(&self) {
        let counts = self.outcomes.iter().counts_by(|o| o.outcome.label());
        info!(
            "Run summary: {}",
            counts
                .iter()
                .sorted()
                .map(|(label, n)| format!("{} {}", n, label))
                .join(", ")
        );
        for o in &self.outcomes {
            match &o.outcome {
                JobOutcome::Succeeded => info!("  {}: {}", o.sample, o.outcome),
                _ => warn!("  {}: {}", o.sample, o.outcome),
            }
        }

        let failed = self.samples_with("failed");
        if !failed.is_empty() {
            info!("Re-run failed partitions with --only-samples {}", failed.iter().join(","));
        }
    }

    /// Tab separated, one row per sample: sample, outcome, artifact, message
    pub fn write_tsv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(["sample", "outcome", "artifact", "message"])?;
        for o in &self.outcomes {
            let message = match &o.outcome {
                JobOutcome::Failed(msg) => msg.as_str(),
                _ => "",
            };
            let artifact = o.artifact_path.to_string_lossy();
            writer.write_record([o.sample.as_str(), o.outcome.label(), artifact.as_ref(), message])?;
        }
        writer.flush()?;
        Ok(())
    }
}
