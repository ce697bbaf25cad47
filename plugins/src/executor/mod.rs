pub mod renderers;
pub mod strategies;

pub use renderers::{JsonlProgressReporter, TextProgressReporter};
pub use strategies::{ExponentialBackoffPlugin, LinearRetryPlugin};
