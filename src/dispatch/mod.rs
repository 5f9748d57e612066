mod backend;
mod cluster;
mod dispatcher;
mod local;
mod poller;
mod subprocess;
mod summary;

pub use backend::BackendStatus;
pub use backend::ExecutionBackend;
pub use backend::Lane;
pub use backend::StatusBoard;

pub use cluster::ClusterBackend;
pub use cluster::ClusterConfig;

pub use dispatcher::plan_lanes;
pub use dispatcher::Dispatcher;

pub use local::LocalBackend;

pub use poller::Poller;
pub use poller::DEFAULT_POLL_INTERVAL;

pub use subprocess::SubprocessBackend;

pub use summary::JobOutcome;
pub use summary::RunSummary;
pub use summary::SampleOutcome;
