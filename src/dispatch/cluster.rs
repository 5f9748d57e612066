use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use log::{debug, info};

use crate::denoise::DenoiseInvocation;
use crate::job::JobId;
use crate::runtime::Error;
use crate::utils::{command_to_string, shell_quote, to_absolute_path};

use super::{BackendStatus, ExecutionBackend, Lane};

const RUNNING_MARKER_SUFFIX: &str = ".running";
const EXIT_MARKER_SUFFIX: &str = ".exit";
const LOG_SUFFIX: &str = ".log";

/// How lane scripts are handed to a cluster scheduler
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Program and leading arguments; the script path is appended, e.g. `sbatch --parsable`
    pub submit_command: Vec<String>,

    /// Program and leading arguments; the remote id is appended, e.g. `scancel`
    pub cancel_command: Option<Vec<String>>,

    /// Where scripts, status markers and job logs go
    pub script_dir: PathBuf,
}

impl ClusterConfig {
    pub fn new(submit_command: &str, cancel_command: Option<&str>, script_dir: &Path) -> anyhow::Result<Self> {
        let submit_command = split_command(submit_command);
        if submit_command.is_empty() {
            return Err(Error::invalid_parameter("cluster-submit", "must name a program").into());
        }
        let cancel_command = cancel_command.map(split_command).filter(|c| !c.is_empty());
        Ok(ClusterConfig {
            submit_command,
            cancel_command,
            script_dir: to_absolute_path(script_dir)?,
        })
    }
}

fn split_command(s: &str) -> Vec<String> {
    s.split_whitespace().map(|w| w.to_string()).collect()
}

#[derive(Clone, Debug)]
struct ClusterJob {
    sample: String,
    lane: usize,
}

/**
 * Submits one shell script per lane to a scheduler. A job's state lives in
 * marker files next to the scripts: `<sample>.running` once it started and
 * `<sample>.exit` holding its exit code once it finished. The markers can be
 * read by any process, so the scheduler keeps going after this one exits.
 */
#[derive(Debug)]
pub struct ClusterBackend {
    invocation: DenoiseInvocation,
    config: ClusterConfig,
    jobs: HashMap<JobId, ClusterJob>,
    remote_ids: HashMap<usize, String>,
}

impl ClusterBackend {
    pub fn new(invocation: DenoiseInvocation, config: ClusterConfig) -> anyhow::Result<Self> {
        fs::create_dir_all(&config.script_dir).with_context(|| {
            format!("Failed to create script dir {}", config.script_dir.display())
        })?;
        Ok(ClusterBackend {
            invocation,
            config,
            jobs: HashMap::new(),
            remote_ids: HashMap::new(),
        })
    }

    fn marker_path(&self, sample: &str, suffix: &str) -> PathBuf {
        self.config.script_dir.join(format!("{}{}", sample, suffix))
    }

    pub fn script_path(&self, lane: usize) -> PathBuf {
        self.config.script_dir.join(format!("lane_{}.sh", lane))
    }

    /// Shell script running the jobs of a lane in order
    pub fn lane_script(&self, lane: &Lane) -> anyhow::Result<String> {
        let mut script = String::new();
        script.push_str("#!/bin/sh\n");
        script.push_str(&format!("# lane {} with {} job(s)\n", lane.index, lane.jobs.len()));

        for job in &lane.jobs {
            let cmd = self.invocation.command(job)?;
            let running = shell_quote(self.marker_path(job.sample(), RUNNING_MARKER_SUFFIX));
            let exit = shell_quote(self.marker_path(job.sample(), EXIT_MARKER_SUFFIX));
            let log = shell_quote(self.marker_path(job.sample(), LOG_SUFFIX));

            script.push_str(&format!("\n# job {}: {}\n", job.id, job.sample()));
            script.push_str(&format!("date > {}\n", running));
            script.push_str(&format!("{} > {} 2>&1\n", command_to_string(&cmd), log));
            script.push_str(&format!("echo $? > {}.tmp\n", exit));
            script.push_str(&format!("mv {}.tmp {}\n", exit, exit));
        }
        Ok(script)
    }

    fn write_lane_script(&self, lane: &Lane) -> anyhow::Result<PathBuf> {
        let path = self.script_path(lane.index);
        let script = self.lane_script(lane)?;
        let mut f = fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        f.write_all(script.as_bytes())?;
        f.flush()?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    fn clear_markers(&self, sample: &str) -> anyhow::Result<()> {
        for suffix in [RUNNING_MARKER_SUFFIX, EXIT_MARKER_SUFFIX] {
            let p = self.marker_path(sample, suffix);
            if p.exists() {
                fs::remove_file(&p)?;
            }
        }
        Ok(())
    }
}

impl ExecutionBackend for ClusterBackend {
    fn name(&self) -> &str {
        "cluster"
    }

    fn submit(&mut self, lane: &Lane) -> anyhow::Result<()> {
        //Markers of an earlier run would be taken as this run's outcome
        for job in &lane.jobs {
            self.clear_markers(job.sample())?;
        }
        let script_path = self.write_lane_script(lane)?;

        let mut cmd = Command::new(&self.config.submit_command[0]);
        cmd.args(&self.config.submit_command[1..]).arg(&script_path);
        let cmd_string = command_to_string(&cmd);
        debug!("Submitting lane {}: {}", lane.index, cmd_string);

        let output = cmd.output().map_err(|e| {
            Error::utility_execution_error(&self.config.submit_command[0], &cmd_string, Some(e.to_string()))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::utility_execution_error(
                &self.config.submit_command[0],
                cmd_string,
                Some(format!("{}; {}", output.status, stderr)),
            )
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(remote_id) = stdout.split_whitespace().last() {
            info!("Lane {} submitted as {}", lane.index, remote_id);
            self.remote_ids.insert(lane.index, remote_id.to_string());
        } else {
            info!("Lane {} submitted", lane.index);
        }

        for job in &lane.jobs {
            self.jobs.insert(
                job.id,
                ClusterJob {
                    sample: job.sample().to_string(),
                    lane: lane.index,
                },
            );
        }
        Ok(())
    }

    fn poll(&self, job: JobId) -> BackendStatus {
        let Some(cluster_job) = self.jobs.get(&job) else {
            return BackendStatus::Unknown;
        };

        let exit_path = self.marker_path(&cluster_job.sample, EXIT_MARKER_SUFFIX);
        if let Ok(content) = fs::read_to_string(&exit_path) {
            let code = content.trim();
            return if code == "0" {
                BackendStatus::Exited(None)
            } else {
                BackendStatus::Exited(Some(format!(
                    "exit code {}, see {}",
                    code,
                    self.marker_path(&cluster_job.sample, LOG_SUFFIX).display()
                )))
            };
        }

        if self.marker_path(&cluster_job.sample, RUNNING_MARKER_SUFFIX).exists() {
            BackendStatus::Running
        } else {
            BackendStatus::Pending
        }
    }

    /// Cancels the whole lane the job belongs to
    fn cancel(&mut self, job: JobId) -> anyhow::Result<()> {
        let Some(cluster_job) = self.jobs.get(&job) else {
            bail!("Job {} was not submitted", job);
        };
        let Some(cancel_command) = &self.config.cancel_command else {
            bail!("No cancel command configured; cannot cancel job {}", job);
        };
        let Some(remote_id) = self.remote_ids.get(&cluster_job.lane) else {
            bail!("No remote id was captured for lane {}", cluster_job.lane);
        };

        let mut cmd = Command::new(&cancel_command[0]);
        cmd.args(&cancel_command[1..]).arg(remote_id);
        let cmd_string = command_to_string(&cmd);
        info!("Cancelling lane {}: {}", cluster_job.lane, cmd_string);

        let status = cmd.status().map_err(|e| {
            Error::utility_execution_error(&cancel_command[0], &cmd_string, Some(e.to_string()))
        })?;
        if !status.success() {
            return Err(Error::utility_execution_error(
                &cancel_command[0],
                cmd_string,
                Some(status.to_string()),
            )
            .into());
        }
        Ok(())
    }
}
