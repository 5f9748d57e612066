use std::path::{Path, PathBuf};

use crate::runtime::Error;
use crate::utils::to_absolute_path;

pub const DEFAULT_READ_ERROR: f64 = 0.05;
pub const DEFAULT_INDEL_PROB: f64 = 0.01;
pub const DEFAULT_INDEL_MAX: usize = 3;
pub const DEFAULT_TRIM_LENGTH: usize = 100;
pub const DEFAULT_MIN_SIZE: usize = 2;
pub const DEFAULT_THREADS: usize = 1;

///////////////////////////////
/// Numeric parameters shared by every denoising job of a run
#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseParams {
    pub read_error: f64,

    /// Mean error used when estimating the true sequences; the read error when None
    pub mean_error: Option<f64>,

    /// Error probability for each hamming distance
    pub error_dist: Option<Vec<f64>>,

    pub indel_prob: f64,
    pub indel_max: usize,
    pub trim_length: usize,

    /// Sequences less abundant than this are discarded
    pub min_size: usize,

    /// Discard sequences aligning to the references instead of keeping them
    pub negate: bool,

    pub threads: usize,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        DenoiseParams {
            read_error: DEFAULT_READ_ERROR,
            mean_error: None,
            error_dist: None,
            indel_prob: DEFAULT_INDEL_PROB,
            indel_max: DEFAULT_INDEL_MAX,
            trim_length: DEFAULT_TRIM_LENGTH,
            min_size: DEFAULT_MIN_SIZE,
            negate: false,
            threads: DEFAULT_THREADS,
        }
    }
}

impl DenoiseParams {
    pub fn validated(self) -> anyhow::Result<Self> {
        check_probability("read-error", self.read_error)?;
        if let Some(mean_error) = self.mean_error {
            check_probability("mean-error", mean_error)?;
        }
        if let Some(dist) = &self.error_dist {
            if dist.is_empty() {
                return Err(Error::invalid_parameter("error-dist", "empty distribution").into());
            }
            for &p in dist {
                check_probability("error-dist", p)?;
            }
        }
        check_probability("indel-prob", self.indel_prob)?;
        if self.trim_length == 0 {
            return Err(Error::invalid_parameter("trim-length", "must be at least 1").into());
        }
        if self.min_size == 0 {
            return Err(Error::invalid_parameter("min-size", "must be at least 1").into());
        }
        if self.threads == 0 {
            return Err(Error::invalid_parameter("threads", "must be at least 1").into());
        }
        Ok(self)
    }

    pub fn effective_mean_error(&self) -> f64 {
        self.mean_error.unwrap_or(self.read_error)
    }
}

fn check_probability(name: &str, p: f64) -> anyhow::Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, format!("{} is not a probability", p)).into())
    }
}

/// Parse a comma separated list of probabilities, e.g. "1,0.06,0.02"
pub fn parse_error_dist(s: &str) -> anyhow::Result<Vec<f64>> {
    s.split(',')
        .map(|p| {
            p.trim().parse::<f64>().map_err(|_| {
                Error::invalid_parameter("error-dist", format!("cannot parse '{}' as a number", p))
                    .into()
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub sequences: PathBuf,
    pub index: Option<PathBuf>,
}

/// Reference databases in the order given. An index, when given, belongs to
/// the sequence file at the same position; their content is not cross-checked
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceSet {
    pub fn new(sequences: &[PathBuf], indices: &[PathBuf]) -> anyhow::Result<Self> {
        if !indices.is_empty() && indices.len() != sequences.len() {
            return Err(Error::invalid_parameter(
                "ref-db-fp",
                format!(
                    "{} index files given for {} reference files; they must pair up by position",
                    indices.len(),
                    sequences.len()
                ),
            )
            .into());
        }
        //Jobs run in their own temp dir, so relative paths would not resolve
        let mut entries = Vec::with_capacity(sequences.len());
        for (i, seq) in sequences.iter().enumerate() {
            entries.push(ReferenceEntry {
                sequences: to_absolute_path(seq)?,
                index: indices.get(i).map(to_absolute_path).transpose()?,
            });
        }
        Ok(ReferenceSet { entries })
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sequence_files(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.sequences.as_path())
    }

    pub fn index_files(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|e| e.index.as_deref())
    }
}
