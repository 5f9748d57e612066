use std::fs;
use std::path::{Path, PathBuf};

use crate::fileformat::FileFormat;

/// Per-sample subset of the combined input file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub sample: String,
    pub path: PathBuf,
    pub format: FileFormat,

    /// Known when the partition was written in this run, None when found on disk
    pub sequence_count: Option<usize>,
}

impl Partition {
    pub fn file_name_for(sample: &str, format: FileFormat) -> String {
        format!("{}.{}", sample, format.extension())
    }
}

/// List the partitions already present in a split directory, sorted by sample.
/// Files that are not FASTA/FASTQ are ignored
pub fn discover_partitions(dir: &Path) -> anyhow::Result<Vec<Partition>> {
    let mut list = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.metadata()?.is_file() {
            continue;
        }
        let Some(format) = FileFormat::from_path(&path) else {
            continue;
        };
        let Some(sample) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        list.push(Partition {
            sample,
            path,
            format,
            sequence_count: None,
        });
    }
    list.sort_by(|a, b| a.sample.cmp(&b.sample));
    Ok(list)
}
