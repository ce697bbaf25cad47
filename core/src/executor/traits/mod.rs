pub mod program;
pub mod reporter;
pub mod strategy;

pub use program::*;
pub use reporter::*;
pub use strategy::*;
