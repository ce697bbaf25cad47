#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod invocation;

pub use error::{CliError, ConfigError};
pub use executor::{DispatchError, StoreError, TaskError};
pub use invocation::{AdapterError, InvocationError};
