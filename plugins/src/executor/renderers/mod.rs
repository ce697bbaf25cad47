pub mod jsonl;
pub mod text;

pub use jsonl::JsonlProgressReporter;
pub use text::TextProgressReporter;
