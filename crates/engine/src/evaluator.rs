//! Symbolic evaluation of a parsed command function.
//!
//! The evaluator never sees configuration values. Property accesses on the bound
//! parameter become [`EvaluatedValue::Reference`] tags and are substituted later,
//! at launch time, by the process that actually holds the secrets.

use indexmap::IndexMap;
use mcp_hub_types::EvaluatedValue;
use thiserror::Error;

use crate::ast::{ArrowFunction, Node};

/// Failure while evaluating a syntactically valid command function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("reference to undefined variable '{name}' (only '{param}' is bound)")]
    UndefinedVariable { name: String, param: String },

    #[error("unsupported mixed concatenation of literal '{literal}' and property '{property}'")]
    MixedConcatenation { literal: String, property: String },

    #[error("unsupported concatenation of property references: {}", .properties.join(" + "))]
    ReferenceConcatenation { properties: Vec<String> },

    #[error("'{key}' must be {expected}, found {found}")]
    Shape {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("unsupported expression: {construct}")]
    Unsupported { construct: String },
}

/// Evaluates the function body with `bound_param` as the only bound identifier.
///
/// The result is always a [`EvaluatedValue::Map`] whose keys keep their source order.
pub fn evaluate(function: &ArrowFunction, bound_param: &str) -> Result<EvaluatedValue, EvalError> {
    evaluate_object(&function.body, bound_param)
}

fn evaluate_node(node: &Node, bound_param: &str) -> Result<EvaluatedValue, EvalError> {
    match node {
        Node::StringLiteral(text) => Ok(EvaluatedValue::Literal(text.clone())),
        Node::PropertyAccess { base, field } => {
            if base != bound_param {
                return Err(EvalError::UndefinedVariable {
                    name: base.clone(),
                    param: bound_param.to_string(),
                });
            }
            Ok(EvaluatedValue::Reference(field.clone()))
        }
        Node::Identifier(name) if name == bound_param => Err(EvalError::Unsupported {
            construct: format!("the whole '{name}' object cannot be used as a value; access one of its fields"),
        }),
        Node::Identifier(name) => Err(EvalError::UndefinedVariable {
            name: name.clone(),
            param: bound_param.to_string(),
        }),
        Node::TemplateConcatenation(operands) => evaluate_concatenation(operands, bound_param),
        Node::ArrayLiteral(elements) => elements
            .iter()
            .map(|element| evaluate_node(element, bound_param))
            .collect::<Result<Vec<_>, _>>()
            .map(EvaluatedValue::List),
        Node::ObjectLiteral(entries) => evaluate_object(entries, bound_param),
        Node::ArrowFunction(_) => Err(EvalError::Unsupported {
            construct: format!("nested {}", node.describe()),
        }),
    }
}

fn evaluate_object(entries: &IndexMap<String, Node>, bound_param: &str) -> Result<EvaluatedValue, EvalError> {
    let mut evaluated = IndexMap::with_capacity(entries.len());
    for (key, node) in entries {
        evaluated.insert(key.clone(), evaluate_node(node, bound_param)?);
    }
    Ok(EvaluatedValue::Map(evaluated))
}

/// Folds literal-only concatenations. Any reference operand makes the expression unrepresentable.
fn evaluate_concatenation(operands: &[Node], bound_param: &str) -> Result<EvaluatedValue, EvalError> {
    let mut literals = Vec::new();
    let mut references = Vec::new();
    for operand in operands {
        match evaluate_node(operand, bound_param)? {
            EvaluatedValue::Literal(text) => literals.push(text),
            EvaluatedValue::Reference(property) => references.push(property),
            other => {
                return Err(EvalError::Unsupported {
                    construct: format!("concatenation with a {} operand", other.kind()),
                });
            }
        }
    }

    match (literals.is_empty(), references.is_empty()) {
        (_, true) => Ok(EvaluatedValue::Literal(literals.concat())),
        (false, false) => Err(EvalError::MixedConcatenation {
            literal: literals.concat(),
            property: references.remove(0),
        }),
        (true, false) => Err(EvalError::ReferenceConcatenation { properties: references }),
    }
}
