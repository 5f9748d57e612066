mod merger;

pub use merger::discover_artifacts;
pub use merger::expected_artifacts;
pub use merger::sample_of_artifact;
pub use merger::ExpectedArtifact;
pub use merger::MergeReport;
pub use merger::Merger;
