mod command_to_string;
mod paths;

pub use command_to_string::command_to_string;
pub use command_to_string::shell_quote;

pub use paths::artifact_is_complete;
pub use paths::staging_path;
pub use paths::to_absolute_path;
