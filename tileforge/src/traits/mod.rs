//! Collaborator interfaces: inputs, outputs and the user process.

mod input;
pub use input::*;

mod output;
pub use output::*;

mod process;
pub use process::*;
