//! Output of the expression evaluator.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::reference_token;

/// Structured result of evaluating a command function.
///
/// Leaves are either concrete strings or deferred references to a configuration
/// property. Lists and maps keep the order in which they were declared in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluatedValue {
    Literal(String),
    Reference(String),
    List(Vec<EvaluatedValue>),
    Map(IndexMap<String, EvaluatedValue>),
}

impl EvaluatedValue {
    /// Short name of the variant, used in shape errors.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluatedValue::Literal(_) => "literal",
            EvaluatedValue::Reference(_) => "property reference",
            EvaluatedValue::List(_) => "list",
            EvaluatedValue::Map(_) => "object",
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, EvaluatedValue>> {
        match self {
            EvaluatedValue::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

/// References serialize as `$name` tokens; everything else keeps its natural JSON shape.
impl Serialize for EvaluatedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EvaluatedValue::Literal(text) => serializer.serialize_str(text),
            EvaluatedValue::Reference(property) => serializer.serialize_str(&reference_token(property)),
            EvaluatedValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            EvaluatedValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}
