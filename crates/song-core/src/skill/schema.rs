//! Minimal shape checks for stage inputs and outputs.

use serde_json::Value;

use crate::model::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Bool,
    Array,
    Object,
    Any,
}

impl FieldType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => !value.is_null(),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Required top-level fields and their types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadSchema {
    required: Vec<(&'static str, FieldType)>,
}

impl PayloadSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, ty: FieldType) -> Self {
        self.required.push((name, ty));
        self
    }

    /// First mismatch, in declaration order.
    pub fn check(&self, payload: &Payload) -> Result<(), String> {
        for (name, ty) in &self.required {
            match payload.get(*name) {
                None => return Err(format!("missing field `{name}`")),
                Some(v) if !ty.matches(v) => {
                    return Err(format!("field `{name}` expected {ty:?}, found {}", describe(v)));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
