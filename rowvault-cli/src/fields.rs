//! JSON shape of fields on the command line: type attributes plus a literal
//! value, with `null` for SQL null.

use anyhow::{Context, Result};
use rowvault::prelude::{Field, TypeDescriptor, Value};
use serde::{Deserialize, Serialize};

/// One field as read from or written to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLiteral {
    /// Field name.
    pub name: String,
    /// Type attributes.
    #[serde(flatten)]
    pub descriptor: TypeDescriptor,
    /// Invariant literal (base64 for binary kinds) or `null`.
    pub value: Option<String>,
}

impl FieldLiteral {
    /// Parses the literal into a typed field.
    pub fn into_field(self) -> Result<Field> {
        let value = parse_value(&self.descriptor, self.value.as_deref())
            .with_context(|| format!("invalid value for field '{}'", self.name))?;
        Ok(Field::new(self.name, self.descriptor, value))
    }

    /// Formats a decoded field.
    pub fn from_field(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            descriptor: field.scalar.descriptor.clone(),
            value: field.value().to_literal(),
        }
    }
}

/// Parses an optional literal for `descriptor`.
pub fn parse_value(descriptor: &TypeDescriptor, literal: Option<&str>) -> Result<Value> {
    match literal {
        None => Ok(Value::Null),
        Some(literal) => Ok(Value::parse_literal(descriptor.kind, literal)?),
    }
}

/// Parses a JSON array of fields.
pub fn parse_fields(json: &[u8]) -> Result<Vec<Field>> {
    let literals: Vec<FieldLiteral> =
        serde_json::from_slice(json).context("expected a JSON array of fields")?;
    literals.into_iter().map(FieldLiteral::into_field).collect()
}
