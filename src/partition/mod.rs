mod partition;
mod partitioner;

pub use partition::discover_partitions;
pub use partition::Partition;

pub use partitioner::sample_id_from_label;
pub use partitioner::Partitioner;
pub use partitioner::SplitOutcome;
