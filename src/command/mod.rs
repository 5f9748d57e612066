pub mod constants;
pub mod denoise;
pub mod denoise_args;
pub mod merge;
pub mod split;
pub mod workflow;

pub use denoise::DenoiseCMD;
pub use denoise_args::DenoiseArgs;
pub use merge::MergeCMD;
pub use split::SplitCMD;
pub use workflow::{BackendKind, WorkflowCMD};
