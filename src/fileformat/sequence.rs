use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::debug;
use seq_io::fasta::Reader as FastaReader;
use seq_io::fastq::Reader as FastqReader;
use seq_io::fastq::Record as FastqRecord;

use crate::runtime::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum FileFormat {
    Fasta,
    Fastq,
}

impl FileFormat {
    /// Extension used for partition files
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Fasta => "fasta",
            FileFormat::Fastq => "fastq",
        }
    }

    fn marker(&self) -> u8 {
        match self {
            FileFormat::Fasta => b'>',
            FileFormat::Fastq => b'@',
        }
    }

    /// Guess the format from the file name, looking through a .gz suffix
    pub fn from_path(p: &Path) -> Option<FileFormat> {
        let name = p.file_name()?.to_string_lossy().to_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".fasta") || name.ends_with(".fa") || name.ends_with(".fna") {
            Some(FileFormat::Fasta)
        } else if name.ends_with(".fastq") || name.ends_with(".fq") {
            Some(FileFormat::Fastq)
        } else {
            None
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// One record of a FASTA/FASTQ file. Quality is only present for FASTQ
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceRecord {
    pub label: String,
    pub seq: Vec<u8>,
    pub qual: Option<Vec<u8>>,
}

impl SequenceRecord {
    /// First word of the label
    pub fn id(&self) -> &str {
        self.label.split_whitespace().next().unwrap_or("")
    }

    /// A record without quality cannot be written as FASTQ
    pub fn write_to<W: Write>(&self, writer: &mut W, format: FileFormat) -> io::Result<()> {
        match format {
            FileFormat::Fasta => {
                writer.write_all(b">")?;
                writer.write_all(self.label.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.write_all(&self.seq)?;
                writer.write_all(b"\n")?;
            }
            FileFormat::Fastq => {
                let Some(qual) = &self.qual else {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("record '{}' has no quality to write as FASTQ", self.label),
                    ));
                };
                writer.write_all(b"@")?;
                writer.write_all(self.label.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.write_all(&self.seq)?;
                writer.write_all(b"\n+\n")?;
                writer.write_all(qual)?;
                writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

enum InnerReader {
    Fasta(FastaReader<BufReader<Box<dyn Read>>>),
    Fastq(FastqReader<BufReader<Box<dyn Read>>>),
}

/// Lazy, single-pass reader over a FASTA or FASTQ file, optionally compressed
pub struct SequenceReader {
    path: PathBuf,
    format: FileFormat,
    inner: InnerReader,
}

impl SequenceReader {
    /// Open a file and check that its content starts like the declared format
    pub fn open(path: &Path, format: FileFormat) -> anyhow::Result<SequenceReader> {
        let opened_handle = File::open(path).map_err(|_| Error::file_not_found(path))?;

        let (reader, compression) = niffler::get_reader(Box::new(opened_handle))
            .with_context(|| format!("Could not open sequence file {}", path.display()))?;
        debug!(
            "Opened file {} with compression {:?}",
            path.display(),
            compression
        );

        let mut reader = BufReader::new(reader);
        check_first_byte(&mut reader, path, format)?;

        let inner = match format {
            FileFormat::Fasta => InnerReader::Fasta(FastaReader::new(reader)),
            FileFormat::Fastq => InnerReader::Fastq(FastqReader::new(reader)),
        };
        Ok(SequenceReader {
            path: path.to_path_buf(),
            format,
            inner,
        })
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn invalid(&self, e: impl fmt::Display) -> anyhow::Error {
        Error::invalid_format(&self.path, self.format.to_string(), Some(e.to_string())).into()
    }
}

impl Iterator for SequenceReader {
    type Item = anyhow::Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = match &mut self.inner {
            InnerReader::Fasta(reader) => match reader.next()? {
                Ok(rec) => Ok(SequenceRecord {
                    label: String::from_utf8_lossy(seq_io::fasta::Record::head(&rec)).into_owned(),
                    seq: rec.full_seq().into_owned(),
                    qual: None,
                }),
                Err(e) => Err(e.to_string()),
            },
            InnerReader::Fastq(reader) => match reader.next()? {
                Ok(rec) => Ok(SequenceRecord {
                    label: String::from_utf8_lossy(rec.head()).into_owned(),
                    seq: rec.seq().to_vec(),
                    qual: Some(rec.qual().to_vec()),
                }),
                Err(e) => Err(e.to_string()),
            },
        };
        Some(rec.map_err(|e| self.invalid(e)))
    }
}

/// The first non-blank byte decides if the content matches the format. An
/// empty file is valid for either format. Leading blank lines are consumed
fn check_first_byte<R: BufRead>(reader: &mut R, path: &Path, format: FileFormat) -> anyhow::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(());
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let found = buf[pos];
                if found == format.marker() {
                    reader.consume(pos);
                    return Ok(());
                }
                return Err(Error::invalid_format(
                    path,
                    format.to_string(),
                    Some(format!(
                        "expected records to start with '{}', found '{}'",
                        format.marker() as char,
                        found.escape_ascii()
                    )),
                )
                .into());
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn test_read_multiline_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "a.fasta", ">S1_0 some desc\nACGT\nTTGA\n>S1_1\nGG\n");
        let records: Vec<SequenceRecord> = SequenceReader::open(&p, FileFormat::Fasta)
            .unwrap()
            .collect::<anyhow::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "S1_0 some desc");
        assert_eq!(records[0].id(), "S1_0");
        assert_eq!(records[0].seq, b"ACGTTTGA".to_vec());
        assert_eq!(records[1].qual, None);
    }

    #[test]
    fn test_read_fastq() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "a.fastq", "@S2_0\nACGT\n+\nIIII\n");
        let records: Vec<SequenceRecord> = SequenceReader::open(&p, FileFormat::Fastq)
            .unwrap()
            .collect::<anyhow::Result<_>>()
            .unwrap();
        assert_eq!(records[0].qual, Some(b"IIII".to_vec()));
    }

    #[test]
    fn test_fastq_needs_quality() {
        let mut record = SequenceRecord {
            label: "S1_0".to_string(),
            seq: b"ACGT".to_vec(),
            qual: None,
        };
        let mut out = Vec::new();
        let err = record.write_to(&mut out, FileFormat::Fastq).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(out.is_empty());

        record.qual = Some(b"IIII".to_vec());
        record.write_to(&mut out, FileFormat::Fastq).unwrap();
        assert_eq!(out, b"@S1_0\nACGT\n+\nIIII\n".to_vec());
    }

    #[test]
    fn test_declared_format_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "a.fasta", "\n>S1_0\nACGT\n");
        let err = SequenceReader::open(&p, FileFormat::Fastq).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_write_roundtrip_fastq() {
        let rec = SequenceRecord {
            label: "S1_3".to_string(),
            seq: b"AC".to_vec(),
            qual: Some(b"#I".to_vec()),
        };
        let mut out = Vec::new();
        rec.write_to(&mut out, FileFormat::Fastq).unwrap();
        assert_eq!(out, b"@S1_3\nAC\n+\n#I\n".to_vec());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path(Path::new("x/S1.fasta")), Some(FileFormat::Fasta));
        assert_eq!(FileFormat::from_path(Path::new("reads.fq.gz")), Some(FileFormat::Fastq));
        assert_eq!(FileFormat::from_path(Path::new("S1.features.tsv")), None);
    }
}
