pub mod cli;

pub use cli::{CliProgram, DEFAULT_STDIN_THRESHOLD};
