//! Process configuration: parameters as read from YAML, and the validated [`ProcessConfig`].

mod baselevels;
pub use baselevels::*;

mod mode;
pub use mode::*;

mod parameters;
pub use parameters::*;

mod process_config;
pub use process_config::*;
