use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use log::info;

use crate::fileformat::FileFormat;
use crate::partition::Partitioner;
use crate::runtime::{DEFAULT_BUFFER_SIZE, DEFAULT_DELIMITER};

#[derive(Args)]
pub struct SplitCMD {
    #[arg(short = 'i', long = "seqs-fp", value_parser = clap::value_parser!(PathBuf))]
    pub seqs_fp: PathBuf,

    // Directory for the per-sample files; left alone if not empty
    #[arg(short = 'o', long = "output-dir", value_parser = clap::value_parser!(PathBuf))]
    pub output_dir: PathBuf,

    #[arg(long = "file-type", value_enum, default_value_t = FileFormat::Fasta)]
    pub file_type: FileFormat,

    #[arg(long = "delim", default_value = DEFAULT_DELIMITER)]
    pub delim: String,

    #[arg(long = "buffer-size", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

impl SplitCMD {
    pub fn try_execute(&mut self) -> Result<()> {
        let partitioner = Partitioner::new(self.file_type, &self.delim, self.buffer_size)?;
        let outcome = partitioner.split_if_absent(&self.seqs_fp, &self.output_dir)?;

        for p in outcome.partitions() {
            match p.sequence_count {
                Some(n) => info!("{}\t{}\t{}", p.sample, n, p.path.display()),
                None => info!("{}\t{}", p.sample, p.path.display()),
            }
        }
        info!(
            "Split has finished; {} partition(s) in {}",
            outcome.partitions().len(),
            self.output_dir.display()
        );
        Ok(())
    }
}
