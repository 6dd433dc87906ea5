//! # MCP Hub Engine
//!
//! Turns a Smithery `commandFunction` into a [`RunDescriptor`] without ever
//! executing it, and rewrites build recipes so they launch that descriptor.
//!
//! ## Pipeline
//!
//! - **`lexer`** / **`parser`**: source text to a closed [`ast::Node`] tree
//! - **`evaluator`**: symbolic evaluation; config accesses become references
//! - **`normalize`**: shape checks and referential integrity against the schema
//! - **`inject`**: `ENTRYPOINT` / Kraftfile `cmd` rewriting
//! - **`launch`**: late substitution of reference values
//!
//! ```rust
//! use mcp_hub_engine::resolve_command;
//! use mcp_hub_types::{Property, PropertySchema, PropertyType, TransportType};
//!
//! let schema = PropertySchema::new([Property::new("apiKey", PropertyType::String).required(true).secret(true)])?;
//! let descriptor = resolve_command(
//!     "config => ({command: 'node', args: ['dist/index.js'], env: {API_KEY: config.apiKey}})",
//!     &schema,
//!     TransportType::Stdio,
//! )?;
//! assert_eq!(descriptor.placeholder_command_line(), vec!["node", "dist/index.js"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use mcp_hub_types::{PropertySchema, RunDescriptor, TransportType};
use thiserror::Error;
use tracing::{debug, warn};

pub mod ast;
pub mod evaluator;
pub mod inject;
pub mod launch;
pub mod lexer;
pub mod normalize;
pub mod parser;

pub use evaluator::{EvalError, evaluate};
pub use inject::{InjectError, inject, inject_command, inject_kraftfile};
pub use launch::{LaunchError, ResolvedCommand, ResolvedValue, environment_lookup, substitute};
pub use normalize::{SchemaMismatchError, normalize};
pub use parser::{ParseError, parse};

/// Any failure on the way from command-function source to a run descriptor.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatchError),
}

/// Parses, evaluates, and normalizes a command function.
pub fn resolve_command(source: &str, schema: &PropertySchema, transport: TransportType) -> Result<RunDescriptor, ResolveError> {
    let function = parse(source)?;
    let evaluated = evaluate(&function, &function.param)?;
    normalize(&evaluated, schema, transport)
}

/// A [`ResolveError`] tagged with the descriptor it came from.
#[derive(Debug, Error)]
#[error("descriptor '{descriptor}': {source}")]
pub struct DescriptorError {
    pub descriptor: String,
    #[source]
    pub source: ResolveError,
}

/// [`resolve_command`] for a named descriptor, with the name attached to logs and errors.
pub fn resolve_descriptor(
    name: &str,
    source: &str,
    schema: &PropertySchema,
    transport: TransportType,
) -> Result<RunDescriptor, DescriptorError> {
    match resolve_command(source, schema, transport) {
        Ok(descriptor) => {
            debug!(descriptor = %name, command = %descriptor.command, "resolved command function");
            Ok(descriptor)
        }
        Err(source) => {
            warn!(descriptor = %name, error = %source, "failed to resolve command function");
            Err(DescriptorError {
                descriptor: name.to_string(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_errors_keep_their_stage() {
        let empty = PropertySchema::default();
        assert!(matches!(resolve_command("config =>", &empty, TransportType::Stdio), Err(ResolveError::Parse(_))));
        assert!(matches!(
            resolve_command("c => ({command: other})", &empty, TransportType::Stdio),
            Err(ResolveError::Eval(_))
        ));
        assert!(matches!(
            resolve_command("c => ({command: 'x', args: [c.port]})", &empty, TransportType::Stdio),
            Err(ResolveError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn descriptor_errors_name_the_descriptor() {
        let error = resolve_descriptor("qdrant", "c => ({command: c.bin})", &PropertySchema::default(), TransportType::Stdio).unwrap_err();
        assert_eq!(error.descriptor, "qdrant");
        assert!(error.to_string().starts_with("descriptor 'qdrant': 'command' must be a literal string"));
    }
}
