pub const DEFAULT_BACKEND: &str = "local";
pub const DEFAULT_CLUSTER_SUBMIT: &str = "sbatch";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_MODE: &str = "terminal";
pub const DEFAULT_LOG_PATH: &str = "pardeblur.log";
