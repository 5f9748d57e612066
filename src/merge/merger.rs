use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info, warn};

use crate::fileformat::FeatureTable;
use crate::job::{artifact_path_for, ARTIFACT_SUFFIX};
use crate::partition::Partition;
use crate::runtime::Error;
use crate::utils::{artifact_is_complete, staging_path};

/// Per-sample feature tables in a directory, sorted by path
pub fn discover_artifacts(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut artifacts = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to list artifacts in {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && sample_of_artifact(&path).is_some() {
            artifacts.push(path);
        }
    }
    artifacts.sort();
    Ok(artifacts)
}

pub fn sample_of_artifact(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .strip_suffix(ARTIFACT_SUFFIX)
        .filter(|s| !s.is_empty())
}

/// A sample that should have produced a table at `path`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedArtifact {
    pub sample: String,
    pub path: PathBuf,
}

pub fn expected_artifacts(partitions: &[Partition], per_sample_dir: &Path) -> Vec<ExpectedArtifact> {
    partitions
        .iter()
        .map(|p| ExpectedArtifact {
            sample: p.sample.clone(),
            path: artifact_path_for(per_sample_dir, &p.sample),
        })
        .collect()
}

#[derive(Debug)]
pub struct MergeReport {
    pub table: FeatureTable,
    pub merged: Vec<PathBuf>,

    /// Expected samples without a usable table
    pub missing: Vec<String>,
}

/**
 * Joins per-sample tables into one. Expected samples without a non-empty
 * table are reported as missing; strict mode turns that into IncompleteMerge,
 * raised before any table is read or written.
 *
 * Samples marked unfinished are missing no matter what is on disk: their job
 * may still replace the table, and a table from an earlier run is stale.
 */
#[derive(Clone, Debug, Default)]
pub struct Merger {
    strict: bool,
    unfinished: BTreeSet<String>,
}

impl Merger {
    pub fn new(strict: bool) -> Self {
        Merger {
            strict,
            unfinished: BTreeSet::new(),
        }
    }

    pub fn with_unfinished<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unfinished.extend(samples.into_iter().map(Into::into));
        self
    }

    fn is_unfinished(&self, path: &Path) -> bool {
        sample_of_artifact(path).is_some_and(|s| self.unfinished.contains(s))
    }

    pub fn merge_artifacts(
        &self,
        artifacts: &[PathBuf],
        expected: &[ExpectedArtifact],
    ) -> anyhow::Result<MergeReport> {
        let missing: Vec<String> = expected
            .iter()
            .filter(|e| self.unfinished.contains(&e.sample) || !artifact_is_complete(&e.path))
            .map(|e| e.sample.clone())
            .collect();

        if !missing.is_empty() {
            if self.strict {
                return Err(Error::incomplete_merge(missing).into());
            }
            for sample in &missing {
                if self.unfinished.contains(sample) {
                    warn!("Sample '{}' has not finished; it is left out of the merge", sample);
                } else {
                    warn!("No output for sample '{}'; it is left out of the merge", sample);
                }
            }
        }

        let mut to_read: BTreeSet<&Path> = artifacts.iter().map(|p| p.as_path()).collect();
        to_read.extend(expected.iter().map(|e| e.path.as_path()));
        to_read.retain(|p| !self.is_unfinished(p));

        let mut tables = Vec::new();
        let mut merged = Vec::new();
        for path in to_read {
            if !artifact_is_complete(path) {
                if artifacts.iter().any(|p| p == path) {
                    warn!("Skipping empty table {}", path.display());
                }
                continue;
            }
            debug!("Reading {}", path.display());
            tables.push(FeatureTable::read_tsv(path)?);
            merged.push(path.to_path_buf());
        }

        let table = FeatureTable::merge_all(&tables)?;
        info!(
            "Merged {} table(s): {} feature(s) over {} sample(s)",
            merged.len(),
            table.features().len(),
            table.samples().len()
        );
        Ok(MergeReport {
            table,
            merged,
            missing,
        })
    }

    /// Merge, then write the result once
    pub fn merge_to(
        &self,
        artifacts: &[PathBuf],
        expected: &[ExpectedArtifact],
        output: &Path,
    ) -> anyhow::Result<MergeReport> {
        let report = self.merge_artifacts(artifacts, expected)?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staged = staging_path(output);
        report.table.write_tsv(&staged)?;
        fs::rename(&staged, output)
            .with_context(|| format!("Failed to move merged table to {}", output.display()))?;
        info!("Wrote {}", output.display());
        Ok(report)
    }
}
