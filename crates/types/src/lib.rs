//! Shared type definitions for the MCP Hub resolver.
//!
//! The types in this crate are produced and consumed by the engine (parser,
//! evaluator, normalizer, injector) and by the registry (hub entries and catalog
//! publication). They carry no behaviour beyond construction-time validation and
//! serialization.

pub mod descriptor;
pub mod property;
pub mod value;

pub use descriptor::{ArgValue, RunDescriptor, TransportType};
pub use property::{Property, PropertySchema, PropertyType, SchemaError};
pub use value::EvaluatedValue;

/// Prefix used to mark a deferred property reference in published artifacts.
///
/// `"$apiKey"` means "substitute the runtime value of `apiKey` here".
pub const REFERENCE_PREFIX: char = '$';

/// Renders a property name as its deferred placeholder token.
pub fn reference_token(property: &str) -> String {
    format!("{REFERENCE_PREFIX}{property}")
}
