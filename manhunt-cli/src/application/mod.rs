pub mod location;
pub mod walker;

pub use location::{LocationSource, LocationStatus};
pub use walker::Walker;
