//! Syntax tree of a parsed command function.

use indexmap::IndexMap;

/// Expression node.
///
/// The variant set is closed: anything the parser cannot express as one of these
/// is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Bare identifier used as a value (e.g. `config` or `process`).
    Identifier(String),
    /// `base.field` or `base["field"]`.
    PropertyAccess { base: String, field: String },
    StringLiteral(String),
    /// Two or more operands joined with `+`, or a template literal with interpolations.
    TemplateConcatenation(Vec<Node>),
    ArrayLiteral(Vec<Node>),
    /// Keys in declaration order.
    ObjectLiteral(IndexMap<String, Node>),
    /// Never produced below the top level by the parser.
    ArrowFunction(Box<ArrowFunction>),
}

impl Node {
    pub fn describe(&self) -> &'static str {
        match self {
            Node::Identifier(_) => "identifier",
            Node::PropertyAccess { .. } => "property access",
            Node::StringLiteral(_) => "string literal",
            Node::TemplateConcatenation(_) => "concatenation",
            Node::ArrayLiteral(_) => "array literal",
            Node::ObjectLiteral(_) => "object literal",
            Node::ArrowFunction(_) => "arrow function",
        }
    }
}

/// `param => ({ ... })`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrowFunction {
    pub param: String,
    /// The returned object literal.
    pub body: IndexMap<String, Node>,
}
