mod descriptor;
mod handle;
mod params;

pub use descriptor::artifact_path_for;
pub use descriptor::build_job_descriptors;
pub use descriptor::JobDescriptor;
pub use descriptor::JobId;
pub use descriptor::ARTIFACT_SUFFIX;

pub use handle::JobHandle;
pub use handle::JobState;

pub use params::*;
