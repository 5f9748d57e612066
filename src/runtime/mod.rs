mod config;
mod error;
mod logging;

pub use config::*;
pub use error::Error;
pub use logging::*;
