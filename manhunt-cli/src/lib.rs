pub mod application;
pub mod infrastructure;

pub use application::{LocationSource, LocationStatus, Walker};
pub use infrastructure::{CliError, LogConfig, Result};
