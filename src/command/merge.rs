use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::merge::{discover_artifacts, expected_artifacts, Merger};
use crate::partition::discover_partitions;

/// Merges the per-sample tables of a run, e.g. once the jobs of a run with
/// suppressed polling are done
#[derive(Args)]
pub struct MergeCMD {
    // Directory holding the per-sample tables
    #[arg(short = 'i', long = "input-dir", value_parser = clap::value_parser!(PathBuf))]
    pub input_dir: PathBuf,

    #[arg(short = 'o', long = "output-fp", value_parser = clap::value_parser!(PathBuf))]
    pub output_fp: PathBuf,

    // Split directory of the run; every partition in it is expected to have a table
    #[arg(long = "split-dir", value_parser = clap::value_parser!(PathBuf))]
    pub split_dir: Option<PathBuf>,

    #[arg(long = "strict")]
    pub strict: bool,
}

impl MergeCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let artifacts = discover_artifacts(&self.input_dir)?;
        let expected = match &self.split_dir {
            Some(split_dir) => expected_artifacts(&discover_partitions(split_dir)?, &self.input_dir),
            None => Vec::new(),
        };

        let report = Merger::new(self.strict).merge_to(&artifacts, &expected, &self.output_fp)?;
        info!(
            "Merge has finished; {} table(s), {} missing",
            report.merged.len(),
            report.missing.len()
        );
        Ok(())
    }
}
