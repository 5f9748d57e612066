pub mod command;
pub mod denoise;
pub mod dispatch;
pub mod fileformat;
pub mod job;
pub mod merge;
pub mod partition;
pub mod pipeline;
pub mod runtime;
pub mod utils;
