use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use sprs::{CsMat, TriMat};

use crate::runtime::Error;

/// First field of the header line. Columns after it are sample names
pub const HEADER_PREFIX: &str = "#OTU ID";

/**
 * Sparse abundance table with features as rows and samples as columns.
 *
 * Feature and sample names are always stored sorted, so two tables holding
 * the same counts compare equal no matter in which order they were built or
 * merged. Zero counts are never stored.
 */
#[derive(Clone, Debug)]
pub struct FeatureTable {
    features: Vec<String>,
    samples: Vec<String>,
    counts: CsMat<f64>,
}

impl FeatureTable {
    pub fn empty() -> Self {
        FeatureTable {
            features: Vec::new(),
            samples: Vec::new(),
            counts: TriMat::<f64>::new((0, 0)).to_csr(),
        }
    }

    /**
     * Build a table from (feature index, sample index, count) entries into the given name lists.
     * Repeated feature names are collapsed and their counts summed. Repeated sample names are an error
     */
    pub fn from_entries<I>(features: &[String], samples: &[String], entries: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut sample_rank: BTreeMap<&str, usize> = BTreeMap::new();
        for s in samples {
            if sample_rank.insert(s.as_str(), 0).is_some() {
                return Err(Error::duplicate_sample(s.clone(), None::<String>).into());
            }
        }
        for (i, rank) in sample_rank.values_mut().enumerate() {
            *rank = i;
        }

        let mut feature_rank: BTreeMap<&str, usize> =
            features.iter().map(|f| (f.as_str(), 0)).collect();
        for (i, rank) in feature_rank.values_mut().enumerate() {
            *rank = i;
        }

        let feature_map: Vec<usize> = features.iter().map(|f| feature_rank[f.as_str()]).collect();
        let sample_map: Vec<usize> = samples.iter().map(|s| sample_rank[s.as_str()]).collect();

        let mut tri = TriMat::new((feature_rank.len(), sample_rank.len()));
        for (f, s, value) in entries {
            anyhow::ensure!(
                f < features.len() && s < samples.len(),
                "Count entry ({}, {}) is outside a table of {} features and {} samples",
                f,
                s,
                features.len(),
                samples.len()
            );
            if value != 0.0 {
                tri.add_triplet(feature_map[f], sample_map[s], value);
            }
        }

        Ok(FeatureTable {
            features: feature_rank.keys().map(|f| f.to_string()).collect(),
            samples: sample_rank.keys().map(|s| s.to_string()).collect(),
            counts: tri.to_csr(),
        })
    }

    /// Table for a single sample, from a map feature -> count
    pub fn from_sample_counts(sample: &str, counts: &BTreeMap<String, u64>) -> anyhow::Result<Self> {
        let features: Vec<String> = counts.keys().cloned().collect();
        let entries = counts.values().enumerate().map(|(i, &c)| (i, 0, c as f64));
        Self::from_entries(&features, &[sample.to_string()], entries)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Number of stored (non-zero) counts
    pub fn nnz(&self) -> usize {
        self.counts.nnz()
    }

    pub fn get(&self, feature: &str, sample: &str) -> f64 {
        let row = self.features.binary_search_by(|f| f.as_str().cmp(feature));
        let col = self.samples.binary_search_by(|s| s.as_str().cmp(sample));
        match (row, col) {
            (Ok(row), Ok(col)) => self.counts.get(row, col).copied().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.counts.iter().map(|(&v, (row, col))| (row, col, v))
    }

    pub fn merge(&self, other: &FeatureTable) -> anyhow::Result<FeatureTable> {
        Self::merge_all([self, other])
    }

    /**
     * Union of several tables. Features are joined, samples must be disjoint; a sample seen
     * twice gives DuplicateSample
     */
    pub fn merge_all<'a, I>(tables: I) -> anyhow::Result<FeatureTable>
    where
        I: IntoIterator<Item = &'a FeatureTable>,
    {
        let mut features: Vec<String> = Vec::new();
        let mut samples: Vec<String> = Vec::new();
        let mut entries: Vec<(usize, usize, f64)> = Vec::new();
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();

        for (table_index, table) in tables.into_iter().enumerate() {
            for s in &table.samples {
                if let Some(previous) = seen.insert(s.clone(), table_index) {
                    return Err(Error::duplicate_sample(
                        s.clone(),
                        Some(format!("in input tables {} and {}", previous + 1, table_index + 1)),
                    )
                    .into());
                }
            }

            let offset_f = features.len();
            let offset_s = samples.len();
            features.extend(table.features.iter().cloned());
            samples.extend(table.samples.iter().cloned());
            entries.extend(
                table
                    .entries()
                    .map(|(f, s, v)| (f + offset_f, s + offset_s, v)),
            );
        }

        Self::from_entries(&features, &samples, entries)
    }

    pub fn read_tsv(path: &Path) -> anyhow::Result<FeatureTable> {
        let invalid = |msg: String| -> anyhow::Error {
            Error::invalid_format(path, "feature table", Some(msg)).into()
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|_| Error::file_not_found(path))?;

        let mut samples: Option<Vec<String>> = None;
        let mut features: Vec<String> = Vec::new();
        let mut entries: Vec<(usize, usize, f64)> = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| invalid(e.to_string()))?;
            let first = record.get(0).unwrap_or("");

            let Some(header) = &samples else {
                if first.starts_with(HEADER_PREFIX) {
                    samples = Some(record.iter().skip(1).map(|s| s.to_string()).collect());
                } else if !first.starts_with('#') {
                    return Err(invalid(format!(
                        "line {} comes before the '{}' header",
                        line + 1,
                        HEADER_PREFIX
                    )));
                }
                continue;
            };

            if record.len() != header.len() + 1 {
                return Err(invalid(format!(
                    "line {} has {} columns, expected {}",
                    line + 1,
                    record.len(),
                    header.len() + 1
                )));
            }

            let feature_index = features.len();
            features.push(first.to_string());
            for (sample_index, field) in record.iter().skip(1).enumerate() {
                let value: f64 = field.trim().parse().map_err(|_| {
                    invalid(format!("line {} has non-numeric count '{}'", line + 1, field))
                })?;
                entries.push((feature_index, sample_index, value));
            }
        }

        let samples = samples.ok_or_else(|| invalid(format!("no '{}' header", HEADER_PREFIX)))?;
        Self::from_entries(&features, &samples, entries)
    }

    pub fn write_tsv(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create feature table {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_writer(BufWriter::new(file));

        writer.write_record(
            std::iter::once(HEADER_PREFIX).chain(self.samples.iter().map(|s| s.as_str())),
        )?;

        for (row, feature) in self.features.iter().enumerate() {
            let mut values = vec![format_count(0.0); self.samples.len()];
            if let Some(row_view) = self.counts.outer_view(row) {
                for (col, &v) in row_view.iter() {
                    values[col] = format_count(v);
                }
            }
            writer.write_record(std::iter::once(feature.clone()).chain(values))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl PartialEq for FeatureTable {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
            && self.samples == other.samples
            && self.entries().eq(other.entries())
    }
}

fn format_count(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(sample: &str, counts: &[(&str, u64)]) -> FeatureTable {
        let counts: BTreeMap<String, u64> =
            counts.iter().map(|(f, c)| (f.to_string(), *c)).collect();
        FeatureTable::from_sample_counts(sample, &counts).unwrap()
    }

    #[test]
    fn test_merge_is_union() {
        let a = table("S1", &[("ACGT", 3), ("TTTT", 1)]);
        let b = table("S2", &[("ACGT", 5), ("GGGG", 2)]);
        let m = a.merge(&b).unwrap();

        assert_eq!(m.features(), &["ACGT", "GGGG", "TTTT"]);
        assert_eq!(m.samples(), &["S1", "S2"]);
        assert_eq!(m.get("ACGT", "S1"), 3.0);
        assert_eq!(m.get("ACGT", "S2"), 5.0);
        assert_eq!(m.get("GGGG", "S1"), 0.0);
        assert_eq!(m.get("TTTT", "S1"), 1.0);
        assert_eq!(m.nnz(), 4);
    }

    #[test]
    fn test_merge_commutes_and_associates() {
        let a = table("S1", &[("ACGT", 3), ("TTTT", 1)]);
        let b = table("S2", &[("ACGT", 5), ("GGGG", 2)]);
        let c = table("S3", &[("CCCC", 7), ("TTTT", 4)]);

        assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
        assert_eq!(
            a.merge(&b).unwrap().merge(&c).unwrap(),
            a.merge(&b.merge(&c).unwrap()).unwrap()
        );
        assert_eq!(
            FeatureTable::merge_all([&c, &a, &b]).unwrap(),
            FeatureTable::merge_all([&a, &b, &c]).unwrap()
        );
    }

    #[test]
    fn test_merge_rejects_duplicate_sample() {
        let a = table("S1", &[("ACGT", 3)]);
        let b = table("S1", &[("GGGG", 2)]);
        let err = a.merge(&b).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::DuplicateSample { sample, .. }) => assert_eq!(sample, "S1"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let a = table("S1", &[("ACGT", 3)]);
        assert_eq!(a.merge(&FeatureTable::empty()).unwrap(), a);
    }

    #[test]
    fn test_tsv_roundtrip_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("m.features.tsv");
        let m = table("S1", &[("ACGT", 3)])
            .merge(&table("S2", &[("GGGG", 2)]))
            .unwrap();
        m.write_tsv(&p).unwrap();

        let text = std::fs::read_to_string(&p).unwrap();
        assert_eq!(text, "#OTU ID\tS1\tS2\nACGT\t3.0\t0.0\nGGGG\t0.0\t2.0\n");
        assert_eq!(FeatureTable::read_tsv(&p).unwrap(), m);
    }

    #[test]
    fn test_read_tsv_skips_comments_and_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.tsv");
        std::fs::write(&p, "# Constructed from biom file\n#OTU ID\tS9\nAAAA\t4\n").unwrap();
        let t = FeatureTable::read_tsv(&p).unwrap();
        assert_eq!(t.get("AAAA", "S9"), 4.0);

        std::fs::write(&p, "#OTU ID\tS9\nAAAA\t4\t5\n").unwrap();
        let err = FeatureTable::read_tsv(&p).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidFormat { .. })
        ));
    }
}
