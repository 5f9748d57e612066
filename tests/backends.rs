use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use pardeblur::denoise::DenoiseInvocation;
use pardeblur::dispatch::{
    ClusterBackend, ClusterConfig, Dispatcher, ExecutionBackend, JobOutcome, Poller, SubprocessBackend,
};
use pardeblur::fileformat::{FeatureTable, FileFormat};
use pardeblur::job::{build_job_descriptors, DenoiseParams, JobDescriptor, JobState, ReferenceSet};
use pardeblur::partition::Partition;
use pardeblur::pipeline::run_workflow;
use pardeblur::runtime::WorkflowConfig;

const EXE: &str = env!("CARGO_BIN_EXE_pardeblur");

const COMBINED: &str = ">S1_0\nACGTAC\n>S1_1\nACGTAA\n>S2_0\nGGGGTT\n>S3_0\nTTTTAA\n";

fn params() -> DenoiseParams {
    DenoiseParams {
        trim_length: 4,
        min_size: 1,
        ..Default::default()
    }
}

fn config(dir: &Path) -> (WorkflowConfig, PathBuf) {
    let seqs = dir.join("combined.fasta");
    fs::write(&seqs, COMBINED).unwrap();
    let output = dir.join("out").join("merged.tsv");
    let mut config = WorkflowConfig::new(&seqs, &output);
    config.poll_interval = Duration::from_millis(20);
    config.jobs_to_start = 2;
    (config, output)
}

fn write_script(path: &Path, body: &str) -> PathBuf {
    fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_path_buf()
}

/// Stands in for the executable: reads `--sample` and `--output`, then runs `body`
fn fake_exe(dir: &Path, body: &str) -> PathBuf {
    let args = r#"while [ $# -gt 0 ]; do
  case "$1" in
    --sample) sample="$2"; shift ;;
    --output) out="$2"; shift ;;
  esac
  shift
done"#;
    write_script(&dir.join("fake_exe.sh"), &format!("{}\n{}", args, body))
}

fn descriptors(dir: &Path, samples: &[&str]) -> Vec<JobDescriptor> {
    let partitions: Vec<Partition> = samples
        .iter()
        .map(|s| Partition {
            sample: s.to_string(),
            path: dir.join(format!("{}.fasta", s)),
            format: FileFormat::Fasta,
            sequence_count: None,
        })
        .collect();
    fs::create_dir_all(dir.join("per_sample")).unwrap();
    build_job_descriptors(
        &partitions,
        &DenoiseParams::default(),
        &ReferenceSet::default(),
        &dir.join("per_sample"),
        &dir.join("tmp"),
    )
    .unwrap()
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < Duration::from_secs(10), "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(10));
    }
}

fn assert_merged(output: &Path) {
    let merged = FeatureTable::read_tsv(output).unwrap();
    assert_eq!(merged.samples().len(), 3);
    assert_eq!(merged.get("ACGT", "S1"), 2.0);
    assert_eq!(merged.get("GGGG", "S2"), 1.0);
}

#[test]
fn subprocess_backend_runs_denoise_command() {
    let dir = tempfile::tempdir().unwrap();
    let (config, output) = config(dir.path());
    let invocation = DenoiseInvocation::new(Path::new(EXE), None, false).unwrap();
    let backend = Box::new(SubprocessBackend::new(invocation));

    let report = run_workflow(config, &params(), &ReferenceSet::default(), backend).unwrap();
    assert!(report.summary.all_succeeded(), "{:?}", report.summary);
    assert_merged(&output);
}

#[test]
fn subprocess_backend_records_failing_script() {
    let dir = tempfile::tempdir().unwrap();
    let (config, output) = config(dir.path());
    let script = dir.path().join("broken.sh");
    fs::write(&script, "#!/bin/sh\necho 'reference index is corrupt' >&2\nexit 2\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let invocation = DenoiseInvocation::new(Path::new(EXE), Some(script.as_path()), false).unwrap();
    let backend = Box::new(SubprocessBackend::new(invocation));
    let report = run_workflow(config, &params(), &ReferenceSet::default(), backend).unwrap();

    for o in report.summary.outcomes() {
        assert!(matches!(&o.outcome, JobOutcome::Failed(_)), "{:?}", o);
    }
    assert!(report.merge.unwrap().table.samples().is_empty());
    assert!(output.exists());
}

#[test]
fn cluster_backend_with_sh_as_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let (mut config, output) = config(dir.path());
    config.retain_temp_files = true;
    let invocation = DenoiseInvocation::new(Path::new(EXE), None, true).unwrap();
    let cluster = ClusterConfig::new("sh", None, &config.cluster_dir()).unwrap();
    let backend = Box::new(ClusterBackend::new(invocation, cluster).unwrap());

    let report = run_workflow(config.clone(), &params(), &ReferenceSet::default(), backend).unwrap();
    assert!(report.summary.all_succeeded(), "{:?}", report.summary);
    assert_merged(&output);

    let cluster_dir = config.cluster_dir();
    assert!(cluster_dir.join("lane_0.sh").exists());
    assert!(cluster_dir.join("lane_1.sh").exists());
    assert!(!cluster_dir.join("lane_2.sh").exists());
    assert_eq!(fs::read_to_string(cluster_dir.join("S2.exit")).unwrap().trim(), "0");
}

#[test]
fn cli_workflow_and_merge() {
    let dir = tempfile::tempdir().unwrap();
    let seqs = dir.path().join("combined.fasta");
    fs::write(&seqs, COMBINED).unwrap();
    let output = dir.path().join("run").join("merged.tsv");

    let status = Command::new(EXE)
        .arg("workflow")
        .arg("--seqs-fp")
        .arg(&seqs)
        .arg("--output-fp")
        .arg(&output)
        .args(["--trim-length", "4", "--min-size", "1", "-O", "2"])
        .args(["--suppress-polling", "--retain-temp-files", "--log-level", "warn"])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(!output.exists());

    let status = Command::new(EXE)
        .arg("merge")
        .arg("--input-dir")
        .arg(dir.path().join("run").join("per_sample"))
        .arg("--split-dir")
        .arg(dir.path().join("run").join("split"))
        .arg("--output-fp")
        .arg(&output)
        .arg("--strict")
        .status()
        .unwrap();
    assert!(status.success());
    assert_merged(&output);
}

#[test]
fn cli_split_rejects_malformed_labels() {
    let dir = tempfile::tempdir().unwrap();
    let seqs = dir.path().join("combined.fasta");
    fs::write(&seqs, ">S1_0\nACGT\n>S2\nACGT\n").unwrap();

    let output = Command::new(EXE)
        .arg("split")
        .arg("--seqs-fp")
        .arg(&seqs)
        .arg("--output-dir")
        .arg(dir.path().join("split"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("S2"));
    assert_eq!(stderr.lines().filter(|l| l.starts_with("Error:")).count(), 1, "{}", stderr);
    assert!(!stderr.contains("ERROR"), "{}", stderr);
    assert!(!dir.path().join("split").exists());
}

#[test]
fn subprocess_lanes_bound_concurrency() {
    for jobs_to_start in [1, 2, 8] {
        let dir = tempfile::tempdir().unwrap();
        let running = dir.path().join("running");
        fs::create_dir_all(&running).unwrap();
        let counts = dir.path().join("counts.txt");
        let exe = fake_exe(
            dir.path(),
            &format!(
                r#"mkdir '{running}/'"$sample"
ls '{running}' | wc -l >> '{counts}'
sleep 0.2
rmdir '{running}/'"$sample"
printf '#OTU ID\t%s\nAC\t1\n' "$sample" > "$out""#,
                running = running.display(),
                counts = counts.display()
            ),
        );
        let invocation = DenoiseInvocation::new(&exe, None, false).unwrap();
        let backend = SubprocessBackend::new(invocation);
        let mut dispatcher = Dispatcher::new(Box::new(backend), jobs_to_start).unwrap();
        dispatcher
            .dispatch(descriptors(dir.path(), &["S1", "S2", "S3", "S4", "S5", "S6"]))
            .unwrap();

        let poller = Poller {
            interval: Duration::from_millis(10),
            ..Default::default()
        };
        let summary = poller.observe(&mut dispatcher);
        dispatcher.detach();

        assert!(summary.all_succeeded(), "{:?}", summary);
        let max_seen = fs::read_to_string(&counts)
            .unwrap()
            .lines()
            .map(|l| l.trim().parse::<usize>().unwrap())
            .max()
            .unwrap();
        assert!(max_seen <= jobs_to_start, "{} > {}", max_seen, jobs_to_start);
        if jobs_to_start == 1 {
            assert_eq!(max_seen, 1);
        }
    }
}

#[test]
fn subprocess_cancel_kills_running_and_skips_queued() {
    let dir = tempfile::tempdir().unwrap();
    let started = dir.path().join("started");
    let exe = fake_exe(
        dir.path(),
        &format!("touch '{}'\nexec sleep 30", started.display()),
    );
    let invocation = DenoiseInvocation::new(&exe, None, false).unwrap();
    let mut dispatcher = Dispatcher::new(Box::new(SubprocessBackend::new(invocation)), 1).unwrap();
    dispatcher.dispatch(descriptors(dir.path(), &["S1", "S2"])).unwrap();

    wait_for("the first job to start", || started.exists());
    std::thread::sleep(Duration::from_millis(100));
    let start = Instant::now();
    assert_eq!(dispatcher.cancel_outstanding(), 2);
    dispatcher.detach();
    assert!(start.elapsed() < Duration::from_secs(10));
    dispatcher.refresh();

    let handles = dispatcher.handles();
    assert_eq!(handles[0].state(), JobState::Failed);
    assert_eq!(handles[1].state(), JobState::Failed);
    assert_eq!(handles[1].message(), Some("cancelled"));
}

#[test]
fn cluster_cancel_passes_remote_id() {
    let dir = tempfile::tempdir().unwrap();
    let cancelled = dir.path().join("cancelled.txt");
    let submit = write_script(
        &dir.path().join("submit.sh"),
        r#"echo "Submitted batch job $(basename "$1" .sh)""#,
    );
    let cancel = write_script(
        &dir.path().join("cancel.sh"),
        &format!("echo \"$1\" >> '{}'", cancelled.display()),
    );
    let invocation = DenoiseInvocation::new(Path::new(EXE), None, false).unwrap();
    let cluster = ClusterConfig::new(
        submit.to_str().unwrap(),
        Some(cancel.to_str().unwrap()),
        &dir.path().join("cluster"),
    )
    .unwrap();
    let backend = ClusterBackend::new(invocation, cluster).unwrap();
    assert_eq!(backend.name(), "cluster");

    let mut dispatcher = Dispatcher::new(Box::new(backend), 2).unwrap();
    dispatcher.dispatch(descriptors(dir.path(), &["S1", "S2", "S3"])).unwrap();
    dispatcher.refresh();
    assert!(dispatcher.handles().iter().all(|h| h.state() == JobState::Queued));

    assert_eq!(dispatcher.cancel_outstanding(), 3);
    let ids: Vec<String> = fs::read_to_string(&cancelled)
        .unwrap()
        .lines()
        .map(|l| l.to_string())
        .collect();
    assert_eq!(ids, vec!["lane_0", "lane_1", "lane_0"]);
}

#[test]
fn cluster_cancel_without_command_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let submit = write_script(&dir.path().join("submit.sh"), "echo 17");
    let invocation = DenoiseInvocation::new(Path::new(EXE), None, false).unwrap();
    let cluster = ClusterConfig::new(submit.to_str().unwrap(), None, &dir.path().join("cluster")).unwrap();
    let backend = ClusterBackend::new(invocation, cluster).unwrap();

    let mut dispatcher = Dispatcher::new(Box::new(backend), 1).unwrap();
    dispatcher.dispatch(descriptors(dir.path(), &["S1"])).unwrap();
    assert_eq!(dispatcher.cancel_outstanding(), 0);
}
