//! Route handler modules for the REST API

mod download;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use download::*;
pub use system::*;
