//! JSON schema post-processing for strict structured output.
//!
//! The vendor's structured-output validator rejects any object property not
//! explicitly declared, so every object node in a response schema must carry
//! `additionalProperties: false`. This module models schema trees as a
//! discriminated union keyed on the JSON `type` field and rewrites them
//! recursively. Anything that is not an object or array round-trips as an
//! opaque leaf.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Result;

/// Discriminant for `"type": "object"` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectTag {
    #[serde(rename = "object")]
    Object,
}

/// Discriminant for `"type": "array"` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayTag {
    #[serde(rename = "array")]
    Array,
}

/// A JSON schema tree.
///
/// Deserialization tries the object shape, then the array shape, then falls
/// back to a leaf, so any valid JSON value is representable and unknown
/// schema keywords are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaNode {
    Object(ObjectSchema),
    Array(ArraySchema),
    Leaf(Value),
}

/// An object schema node: named properties plus passthrough keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(rename = "type")]
    pub tag: ObjectTag,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,
    /// Holds whatever the caller wrote; normalization forces `false`
    #[serde(
        rename = "additionalProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Value>,
    /// Keywords this module does not interpret (`required`, `description`, ...)
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// An array schema node: the item schema plus passthrough keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArraySchema {
    #[serde(rename = "type")]
    pub tag: ArrayTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl SchemaNode {
    /// Interpret a raw JSON value as a schema tree.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(node) => node,
            Err(_) => SchemaNode::Leaf(value),
        }
    }

    /// Serialize back to a raw JSON value.
    pub fn into_value(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Force `additionalProperties: false` on every object node, at any
    /// depth. Pure and idempotent: normalizing twice equals normalizing once.
    pub fn into_strict(self) -> Self {
        match self {
            SchemaNode::Object(mut object) => {
                object.additional_properties = Some(Value::Bool(false));
                object.properties = object
                    .properties
                    .into_iter()
                    .map(|(name, node)| (name, node.into_strict()))
                    .collect();
                SchemaNode::Object(object)
            }
            SchemaNode::Array(mut array) => {
                array.items = array.items.map(|items| Box::new(items.into_strict()));
                SchemaNode::Array(array)
            }
            SchemaNode::Leaf(value) => SchemaNode::Leaf(value),
        }
    }

    /// True when any object node explicitly opts into permissive
    /// additional-properties behavior, which the vendor API cannot honor.
    pub fn requests_permissive(&self) -> bool {
        match self {
            SchemaNode::Object(object) => {
                object.additional_properties == Some(Value::Bool(true))
                    || object
                        .properties
                        .values()
                        .any(SchemaNode::requests_permissive)
            }
            SchemaNode::Array(array) => array
                .items
                .as_deref()
                .is_some_and(SchemaNode::requests_permissive),
            SchemaNode::Leaf(_) => false,
        }
    }
}
