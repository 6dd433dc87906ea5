//! Small shared helpers for the MCP Hub crates.

pub mod atomic_write;
pub mod path_processing;
pub mod text_processing;

pub use atomic_write::write_atomic;
pub use path_processing::expand_tilde;
pub use text_processing::{REDACTED, redact_sensitive};
