pub mod runtime;

pub use runtime::SessionRuntime;
