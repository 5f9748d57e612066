use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context};
use log::{debug, info};

use crate::fileformat::{FileFormat, SequenceReader, SequenceRecord};
use crate::runtime::Error;

use super::{discover_partitions, Partition};

/// Result of asking for a split; a non-empty split directory is never written again
#[derive(Debug)]
pub enum SplitOutcome {
    Split(Vec<Partition>),
    Reused(Vec<Partition>),
}

impl SplitOutcome {
    pub fn partitions(&self) -> &[Partition] {
        match self {
            SplitOutcome::Split(p) | SplitOutcome::Reused(p) => p,
        }
    }

    pub fn into_partitions(self) -> Vec<Partition> {
        match self {
            SplitOutcome::Split(p) | SplitOutcome::Reused(p) => p,
        }
    }

    pub fn was_reused(&self) -> bool {
        matches!(self, SplitOutcome::Reused(_))
    }
}

/// Sample identifier of a record label: the first word, cut at the last delimiter.
/// `sample_A_12` gives `sample_A`. None if there is no usable sample part
pub fn sample_id_from_label<'a>(label: &'a str, delimiter: &str) -> Option<&'a str> {
    let id = label.split_whitespace().next()?;
    let (sample, _) = id.rsplit_once(delimiter)?;
    let usable = !sample.is_empty()
        && sample != "."
        && sample != ".."
        && !sample.contains('/')
        && !sample.contains('\\');
    if usable {
        Some(sample)
    } else {
        None
    }
}

/**
 * Splits a combined sequence file into one file per sample.
 *
 * A label without a sample identifier aborts the whole split; the partial
 * output is removed so that it cannot be mistaken for a finished split.
 */
#[derive(Clone, Debug)]
pub struct Partitioner {
    format: FileFormat,
    delimiter: String,
    buffer_size: usize,
}

impl Partitioner {
    pub fn new(format: FileFormat, delimiter: &str, buffer_size: usize) -> anyhow::Result<Self> {
        if delimiter.is_empty() {
            return Err(Error::invalid_parameter("delim", "delimiter cannot be empty").into());
        }
        if buffer_size == 0 {
            return Err(Error::invalid_parameter("buffer-size", "must be at least 1").into());
        }
        Ok(Partitioner {
            format,
            delimiter: delimiter.to_string(),
            buffer_size,
        })
    }

    /// Split unless the output directory already holds something, in which case
    /// the partitions found there are returned and nothing is touched
    pub fn split_if_absent(&self, input: &Path, out_dir: &Path) -> anyhow::Result<SplitOutcome> {
        if dir_has_entries(out_dir)? {
            info!(
                "Split directory {} is not empty, reusing the partitions in it",
                out_dir.display()
            );
            return Ok(SplitOutcome::Reused(discover_partitions(out_dir)?));
        }
        Ok(SplitOutcome::Split(self.split(input, out_dir)?))
    }

    /// Split into a directory that must be missing or empty
    pub fn split(&self, input: &Path, out_dir: &Path) -> anyhow::Result<Vec<Partition>> {
        if dir_has_entries(out_dir)? {
            bail!(
                "Refusing to split into {}, it is not empty",
                out_dir.display()
            );
        }

        let created = !out_dir.exists();
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create split directory {}", out_dir.display()))?;

        match self.split_into(input, out_dir) {
            Ok(list) => Ok(list),
            Err(e) => {
                if created {
                    let _ = fs::remove_dir_all(out_dir);
                } else {
                    clear_dir(out_dir);
                }
                Err(e)
            }
        }
    }

    fn split_into(&self, input: &Path, out_dir: &Path) -> anyhow::Result<Vec<Partition>> {
        let reader = SequenceReader::open(input, self.format)?;

        let mut buffers: BTreeMap<String, Vec<SequenceRecord>> = BTreeMap::new();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut num_buffered = 0;
        let mut num_records = 0;

        for rec in reader {
            let rec = rec?;
            num_records += 1;

            let sample = sample_id_from_label(&rec.label, &self.delimiter)
                .ok_or_else(|| Error::malformed_label(rec.label.clone(), num_records, &self.delimiter))?
                .to_string();
            buffers.entry(sample).or_default().push(rec);

            num_buffered += 1;
            if num_buffered >= self.buffer_size {
                self.flush(&mut buffers, &mut counts, out_dir)?;
                num_buffered = 0;
            }
        }
        self.flush(&mut buffers, &mut counts, out_dir)?;

        info!(
            "Split {} records from {} into {} partitions",
            num_records,
            input.display(),
            counts.len()
        );

        Ok(counts
            .into_iter()
            .map(|(sample, n)| Partition {
                path: out_dir.join(Partition::file_name_for(&sample, self.format)),
                sample,
                format: self.format,
                sequence_count: Some(n),
            })
            .collect())
    }

    /// Append all buffered records to their partition files, keeping input order
    fn flush(
        &self,
        buffers: &mut BTreeMap<String, Vec<SequenceRecord>>,
        counts: &mut BTreeMap<String, usize>,
        out_dir: &Path,
    ) -> anyhow::Result<()> {
        for (sample, records) in buffers.iter_mut() {
            if records.is_empty() {
                continue;
            }
            let path = out_dir.join(Partition::file_name_for(sample, self.format));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open partition file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            for rec in records.iter() {
                rec.write_to(&mut writer, self.format)?;
            }
            writer.flush()?;

            debug!("Flushed {} records to {}", records.len(), path.display());
            *counts.entry(sample.clone()).or_insert(0) += records.len();
            records.clear();
        }
        Ok(())
    }
}

fn dir_has_entries(dir: &Path) -> anyhow::Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    if !dir.is_dir() {
        bail!("{} exists but is not a directory", dir.display());
    }
    Ok(fs::read_dir(dir)?.next().is_some())
}

fn clear_dir(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let _ = fs::remove_file(entry.path());
        }
    }
}
