mod dereplicate;
mod invocation;
mod script;
mod workflow;

pub use dereplicate::DereplicateWorkflow;

pub use invocation::param_args;
pub use invocation::DenoiseInvocation;

pub use script::ScriptWorkflow;

pub use workflow::run_job;
pub use workflow::DenoiseWorkflow;
