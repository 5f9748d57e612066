pub mod feature_table;
pub mod sequence;

pub use feature_table::FeatureTable;

pub use sequence::FileFormat;
pub use sequence::SequenceReader;
pub use sequence::SequenceRecord;
