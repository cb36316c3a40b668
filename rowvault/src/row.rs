//! Row codec: an ordered set of named, typed fields serialized into one
//! plaintext buffer for a single envelope.
//!
//! Decoding is driven by the schema captured at encode time, which must agree
//! with the type attributes stored inside the payload. A field that cannot be
//! decoded is kept in place with a null value and reported in the warning
//! list, so a decoded row always has the same fields in the same order as the
//! encoded one.

use crate::error::Error;
use crate::types::{ScalarValue, TypeDescriptor, Value};
use crate::value::{self, EncodedScalar};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Current row document format version.
pub const ROW_FORMAT_VERSION: u32 = 1;

/// Name, position and type of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name, unique within the row.
    pub name: String,
    /// Zero-based position.
    pub ordinal: u32,
    /// Type attributes.
    #[serde(flatten)]
    pub descriptor: TypeDescriptor,
}

/// A named value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Typed value.
    pub scalar: ScalarValue,
}

impl Field {
    /// Creates a field.
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor, value: Value) -> Self {
        Self { name: name.into(), scalar: ScalarValue::new(descriptor, value) }
    }

    /// Returns the value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.scalar.value
    }
}

/// A field that was replaced by null during decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldWarning {
    /// Field name.
    pub name: String,
    /// Field position.
    pub ordinal: u32,
    /// Why decoding failed. Never contains the value.
    pub message: String,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}' (#{}) set to null: {}", self.name, self.ordinal, self.message)
    }
}

/// Fields recovered from a row document.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedRow {
    /// Fields in encode-time order.
    pub fields: Vec<Field>,
    /// One entry per field that was substituted with null.
    pub warnings: Vec<FieldWarning>,
}

impl DecryptedRow {
    /// Returns `true` if every field decoded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Returns the fields, or `Error::PartialRow` naming every field that was
    /// substituted with null.
    ///
    /// # Errors
    ///
    /// Returns `Error::PartialRow` if any warning was recorded.
    pub fn into_strict(self) -> Result<Vec<Field>, Error> {
        if self.warnings.is_empty() {
            Ok(self.fields)
        } else {
            Err(Error::PartialRow {
                fields: self.warnings.into_iter().map(|warning| warning.name).collect(),
            })
        }
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Serialize)]
struct RowDocument {
    format_version: u32,
    fields: Vec<DocumentField>,
}

// Read side of `RowDocument`. Entries stay untyped until they are matched to
// the schema so a malformed entry only costs its own field.
#[derive(Deserialize)]
struct StoredDocument {
    format_version: u32,
    fields: StoredFields,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct StoredFields(Vec<serde_json::Value>);

impl StoredFields {
    fn find(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.iter().find(|entry| entry_name(entry) == Some(name))
    }
}

impl Drop for StoredFields {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(scrub);
    }
}

fn scrub(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(text) => text.zeroize(),
        serde_json::Value::Array(items) => items.iter_mut().for_each(scrub),
        serde_json::Value::Object(map) => map.values_mut().for_each(scrub),
        _ => {}
    }
}

fn entry_name(entry: &serde_json::Value) -> Option<&str> {
    entry.get("name")?.as_str()
}

#[derive(Serialize, Deserialize)]
struct DocumentField {
    name: String,
    ordinal: u32,
    #[serde(flatten)]
    value: EncodedScalar,
}

/// Captures the schema of `fields`, assigning ordinals by position.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` for an empty or duplicate name, or more
/// fields than fit a `u32` ordinal.
pub fn schema_of(fields: &[Field]) -> Result<Vec<FieldSchema>, Error> {
    let mut seen = HashSet::with_capacity(fields.len());
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            if field.name.is_empty() {
                return Err(Error::InvalidParameter(format!("field #{index} has an empty name")));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::InvalidParameter(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
            let ordinal = u32::try_from(index)
                .map_err(|_| Error::InvalidParameter("too many fields".to_string()))?;
            Ok(FieldSchema {
                name: field.name.clone(),
                ordinal,
                descriptor: field.scalar.descriptor.clone(),
            })
        })
        .collect()
}

/// Serializes `fields` into one plaintext buffer, zeroized on drop.
///
/// # Errors
///
/// Returns the schema errors of [`schema_of`] and any value encoding error;
/// encoding errors abort the whole row.
pub fn encode_fields(fields: &[Field]) -> Result<(Vec<FieldSchema>, Zeroizing<Vec<u8>>), Error> {
    let schema = schema_of(fields)?;

    let mut encoded = Vec::with_capacity(fields.len());
    for (field, field_schema) in fields.iter().zip(&schema) {
        let value = value::encode(&field.scalar).map_err(|err| {
            tracing::debug!(
                field = %field.name,
                ordinal = field_schema.ordinal,
                kind = %field_schema.descriptor.kind,
                "field encoding failed"
            );
            err
        })?;
        encoded.push(DocumentField {
            name: field.name.clone(),
            ordinal: field_schema.ordinal,
            value,
        });
    }

    let document = RowDocument { format_version: ROW_FORMAT_VERSION, fields: encoded };
    let plaintext = value::to_zeroizing_json(&document)?;
    Ok((schema, plaintext))
}

/// Parses a buffer produced by [`encode_fields`], decoding each field as
/// `schema` describes it.
///
/// # Errors
///
/// Returns `Error::Serialization` if the buffer is not a row document and
/// `Error::UnsupportedVersion` for an unknown format version. Per-field
/// failures are not errors; they become warnings.
pub fn decode_fields(schema: &[FieldSchema], plaintext: &[u8]) -> Result<DecryptedRow, Error> {
    let document: StoredDocument = serde_json::from_slice(plaintext)?;
    if document.format_version != ROW_FORMAT_VERSION {
        return Err(Error::UnsupportedVersion {
            version: document.format_version,
            supported: ROW_FORMAT_VERSION.to_string(),
        });
    }

    let mut fields = Vec::with_capacity(schema.len());
    let mut warnings = Vec::new();

    for field_schema in schema {
        let decoded = match document.fields.find(&field_schema.name) {
            Some(entry) => decode_entry(entry, field_schema),
            None => Err("missing from payload".to_string()),
        };

        let value = decoded.unwrap_or_else(|message| {
            tracing::warn!(
                field = %field_schema.name,
                ordinal = field_schema.ordinal,
                kind = %field_schema.descriptor.kind,
                "field could not be decoded; substituting null"
            );
            warnings.push(FieldWarning {
                name: field_schema.name.clone(),
                ordinal: field_schema.ordinal,
                message,
            });
            Value::Null
        });

        fields.push(Field {
            name: field_schema.name.clone(),
            scalar: ScalarValue::new(field_schema.descriptor.clone(), value),
        });
    }

    let extra = document
        .fields
        .0
        .iter()
        .filter(|entry| !schema.iter().any(|field| entry_name(entry) == Some(field.name.as_str())))
        .count();
    if extra > 0 {
        tracing::debug!(extra, "payload fields absent from schema were ignored");
    }

    Ok(DecryptedRow { fields, warnings })
}

// The message never includes the entry's content.
fn decode_entry(entry: &serde_json::Value, schema: &FieldSchema) -> Result<Value, String> {
    let stored =
        DocumentField::deserialize(entry).map_err(|_| "malformed field entry".to_string())?;
    if stored.ordinal != schema.ordinal {
        return Err(format!(
            "stored at position {} instead of {}",
            stored.ordinal, schema.ordinal
        ));
    }
    value::decode_exact(&stored.value, &schema.descriptor).map_err(|err| err.to_string())
}
