use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use super::{Dispatcher, JobOutcome, RunSummary};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/**
 * Waits for the dispatched jobs. With `suppress` set, nothing is waited for
 * and every unfinished job is reported Pending; the jobs carry on and their
 * outputs are merged by a later call. A timeout ends the waiting only, never
 * the jobs.
 */
#[derive(Clone, Debug)]
pub struct Poller {
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub suppress: bool,
}

impl Default for Poller {
    fn default() -> Self {
        Poller {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            suppress: false,
        }
    }
}

impl Poller {
    pub fn observe(&self, dispatcher: &mut Dispatcher) -> RunSummary {
        if self.suppress {
            info!("Polling suppressed; {} job(s) left to run unobserved", dispatcher.handles().len());
            return RunSummary::from_handles(dispatcher.handles(), JobOutcome::Pending);
        }

        let start = Instant::now();
        let mut last_reported = None;
        loop {
            dispatcher.refresh();

            let num_done = dispatcher.handles().iter().filter(|h| h.is_terminal()).count();
            let progress = (num_done, dispatcher.running_count());
            if last_reported != Some(progress) {
                info!(
                    "{}/{} job(s) finished, {} running",
                    progress.0,
                    dispatcher.handles().len(),
                    progress.1
                );
                last_reported = Some(progress);
            }

            if dispatcher.all_terminal() {
                return RunSummary::from_handles(dispatcher.handles(), JobOutcome::TimedOut);
            }

            let mut wait = self.interval;
            if let Some(timeout) = self.timeout {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    info!("Stopped waiting after {:?}; unfinished jobs keep running", timeout);
                    return RunSummary::from_handles(dispatcher.handles(), JobOutcome::TimedOut);
                }
                wait = wait.min(timeout - elapsed);
            }
            debug!("Next poll in {:?}", wait);
            thread::sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use anyhow::bail;

    use crate::dispatch::{BackendStatus, ExecutionBackend, Lane};
    use crate::fileformat::FileFormat;
    use crate::job::{build_job_descriptors, DenoiseParams, JobId, JobState, ReferenceSet};
    use crate::partition::Partition;

    #[derive(Debug)]
    struct StuckBackend;

    impl ExecutionBackend for StuckBackend {
        fn name(&self) -> &str {
            "stuck"
        }
        fn submit(&mut self, _lane: &Lane) -> anyhow::Result<()> {
            Ok(())
        }
        fn poll(&self, _job: JobId) -> BackendStatus {
            BackendStatus::Running
        }
        fn cancel(&mut self, job: JobId) -> anyhow::Result<()> {
            bail!("job {} cannot be cancelled", job)
        }
    }

    fn dispatched(samples: &[&str]) -> Dispatcher {
        let partitions: Vec<Partition> = samples
            .iter()
            .map(|s| Partition {
                sample: s.to_string(),
                path: PathBuf::from(format!("/data/{}.fasta", s)),
                format: FileFormat::Fasta,
                sequence_count: None,
            })
            .collect();
        let jobs = build_job_descriptors(
            &partitions,
            &DenoiseParams::default(),
            &ReferenceSet::default(),
            &PathBuf::from("/data/per_sample"),
            &PathBuf::from("/data/tmp"),
        )
        .unwrap();
        let mut dispatcher = Dispatcher::new(Box::new(StuckBackend), 2).unwrap();
        dispatcher.dispatch(jobs).unwrap();
        dispatcher
    }

    #[test]
    fn test_timeout_reports_timed_out() {
        let mut dispatcher = dispatched(&["S1", "S2"]);
        let poller = Poller {
            interval: Duration::from_millis(5),
            timeout: Some(Duration::from_millis(30)),
            suppress: false,
        };
        let start = Instant::now();
        let summary = poller.observe(&mut dispatcher);
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(summary.samples_with("timed_out"), vec!["S1", "S2"]);
        assert!(summary.samples_with("failed").is_empty());
        assert_eq!(dispatcher.running_count(), 2);
    }

    #[test]
    fn test_suppressed_does_not_poll() {
        let mut dispatcher = dispatched(&["S1", "S2", "S3"]);
        let poller = Poller {
            suppress: true,
            ..Default::default()
        };
        let summary = poller.observe(&mut dispatcher);
        assert_eq!(summary.samples_with("pending"), vec!["S1", "S2", "S3"]);
        assert!(dispatcher.handles().iter().all(|h| h.state() == JobState::Queued));
    }

    #[test]
    fn test_failed_cancel_is_not_counted() {
        let mut dispatcher = dispatched(&["S1"]);
        assert_eq!(dispatcher.cancel_outstanding(), 0);
    }
}
