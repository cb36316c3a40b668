//! Type-preserving serialization of a single scalar value.
//!
//! A value is encoded as its kind tag, its type attributes and a content
//! marker that keeps null, empty and literal content apart. Literals are
//! carried verbatim, so whitespace and padding survive untouched.
//!
//! ```text
//! {"type":"char","nullable":true,"max_length":5,"content":{"state":"literal","literal":"AB   "}}
//! {"type":"varchar","nullable":true,"content":{"state":"empty"}}
//! {"type":"int","nullable":true,"content":{"state":"null"}}
//! ```

use crate::error::Error;
use crate::types::{DecimalShape, ScalarKind, ScalarValue, TypeDescriptor, Value};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::io;
use zeroize::{Zeroize, Zeroizing};

/// Content marker of an encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "literal", rename_all = "lowercase")]
pub enum Content {
    /// SQL null.
    Null,
    /// Zero-length text or binary.
    Empty,
    /// Invariant literal text (base64 for binary kinds).
    Literal(String),
}

impl Drop for Content {
    fn drop(&mut self) {
        if let Self::Literal(text) = self {
            text.zeroize();
        }
    }
}

/// Wire form of one scalar value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedScalar {
    /// Kind tag. Kept as text so unknown tags surface as `UnknownTypeTag`.
    #[serde(rename = "type")]
    pub tag: String,
    /// Whether the source column was nullable.
    pub nullable: bool,
    /// Declared length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Decimal precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    /// Decimal scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    /// Content marker.
    pub content: Content,
}

impl EncodedScalar {
    /// Rebuilds the descriptor the value was encoded with.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTypeTag` if the tag is not a known kind.
    pub fn descriptor(&self) -> Result<TypeDescriptor, Error> {
        Ok(TypeDescriptor {
            kind: self.tag.parse()?,
            nullable: self.nullable,
            max_length: self.max_length,
            precision: self.precision,
            scale: self.scale,
        })
    }
}

/// Encodes a value, enforcing its descriptor.
///
/// Fixed-width values shorter than the declared length are padded with
/// spaces (text) or zero bytes (binary); longer ones are rejected, as are
/// variable-width values over their limit.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` for an invalid descriptor, a null in a
/// non-nullable column, or an over-length value. Returns
/// `Error::TypeMismatch` if the value shape does not match the kind.
pub fn encode(scalar: &ScalarValue) -> Result<EncodedScalar, Error> {
    let descriptor = &scalar.descriptor;
    descriptor.validate()?;
    let kind = descriptor.kind;

    if !kind.accepts(&scalar.value) {
        return Err(Error::mismatch(kind, scalar.value.shape()));
    }

    let content = match &scalar.value {
        Value::Null if descriptor.nullable => Content::Null,
        Value::Null => {
            return Err(Error::InvalidParameter(format!("null value for non-nullable {kind}")));
        }
        Value::Text(text) => {
            let text = fit_text(text, descriptor)
                .map_err(|len| over_length(descriptor, len, "characters"))?;
            if text.is_empty() {
                Content::Empty
            } else {
                Content::Literal(text)
            }
        }
        Value::Bytes(bytes) => {
            let bytes = fit_bytes(bytes, descriptor)
                .map_err(|len| over_length(descriptor, len, "bytes"))?;
            if bytes.is_empty() {
                Content::Empty
            } else {
                Content::Literal(crate::envelope::encode_base64(&bytes))
            }
        }
        Value::Decimal(text) => {
            check_decimal(text, descriptor).map_err(|err| match err {
                Error::TypeMismatch { .. } => Error::InvalidParameter(format!(
                    "decimal literal does not fit {kind}{}",
                    bounds_suffix(descriptor)
                )),
                other => other,
            })?;
            Content::Literal(text.clone())
        }
        Value::DateTimeOffset(datetime) if datetime.offset().local_minus_utc() % 60 != 0 => {
            return Err(Error::InvalidParameter(
                "datetimeoffset offset must be a whole number of minutes".to_string(),
            ));
        }
        other => Content::Literal(other.to_literal().unwrap_or_default()),
    };

    Ok(EncodedScalar {
        tag: kind.as_str().to_string(),
        nullable: descriptor.nullable,
        max_length: descriptor.max_length,
        precision: descriptor.precision,
        scale: descriptor.scale,
        content,
    })
}

/// Decodes a value, coercing it to `target`.
///
/// Null and empty are restored as stored. Text is never trimmed: decoding
/// into a fixed-width text kind pads with spaces and rejects longer values.
///
/// # Errors
///
/// Returns `Error::UnknownTypeTag` for an unknown stored tag and
/// `Error::TypeMismatch` when the stored value cannot be represented as
/// `target` without loss.
pub fn decode(encoded: &EncodedScalar, target: &TypeDescriptor) -> Result<Value, Error> {
    let stored: ScalarKind = encoded.tag.parse()?;
    if !stored.coercible_to(target.kind) {
        return Err(Error::mismatch(target.kind, stored));
    }

    match &encoded.content {
        Content::Null if target.nullable => Ok(Value::Null),
        Content::Null => Err(Error::mismatch(format!("non-null {}", target.kind), "null")),
        Content::Empty if stored.is_text() => coerce(Value::Text(String::new()), target),
        Content::Empty if stored.is_binary() => coerce(Value::Bytes(Vec::new()), target),
        Content::Empty => Err(Error::mismatch(target.kind, format!("empty {stored}"))),
        Content::Literal(literal) => coerce(Value::parse_literal(stored, literal)?, target),
    }
}

/// Decodes a value whose carried descriptor must equal the one stored with it.
///
/// The stored descriptor travels inside the authenticated plaintext; a
/// carried copy that disagrees with it is rejected rather than coerced.
///
/// # Errors
///
/// Returns `Error::UnknownTypeTag` for an unknown stored tag,
/// `Error::TypeMismatch` when the descriptors differ, and the errors of
/// [`decode`].
pub fn decode_exact(encoded: &EncodedScalar, carried: &TypeDescriptor) -> Result<Value, Error> {
    let stored = encoded.descriptor()?;
    if &stored != carried {
        return Err(Error::mismatch(describe(carried), describe(&stored)));
    }
    decode(encoded, &stored)
}

/// Convenience wrapper decoding into the descriptor the value was stored with.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_as_stored(encoded: &EncodedScalar) -> Result<Value, Error> {
    decode(encoded, &encoded.descriptor()?)
}

/// Serializes an encoded value into a plaintext buffer that is zeroized on drop.
///
/// # Errors
///
/// Returns `Error::Serialization` if JSON encoding fails.
pub fn to_plaintext(encoded: &EncodedScalar) -> Result<Zeroizing<Vec<u8>>, Error> {
    to_zeroizing_json(encoded)
}

/// Serializes `value` as JSON into a buffer allocated once at its final size,
/// so no unzeroized intermediate copy is left behind by reallocation.
pub(crate) fn to_zeroizing_json<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, value)?;

    let mut buffer = Zeroizing::new(Vec::with_capacity(counter.0));
    serde_json::to_writer(&mut *buffer, value)?;
    Ok(buffer)
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parses a plaintext buffer produced by [`to_plaintext`].
///
/// # Errors
///
/// Returns `Error::Serialization` if the buffer is not a valid encoded value.
pub fn from_plaintext(plaintext: &[u8]) -> Result<EncodedScalar, Error> {
    Ok(serde_json::from_slice(plaintext)?)
}

fn coerce(value: Value, target: &TypeDescriptor) -> Result<Value, Error> {
    let kind = target.kind;
    let value = match value {
        Value::Text(text) => Value::Text(
            fit_text(&text, target).map_err(|_| Error::mismatch(kind, "longer text"))?,
        ),
        Value::Bytes(bytes) => Value::Bytes(
            fit_bytes(&bytes, target).map_err(|_| Error::mismatch(kind, "longer binary"))?,
        ),
        Value::TinyInt(v) => match kind {
            ScalarKind::SmallInt => Value::SmallInt(i16::from(v)),
            ScalarKind::Int => Value::Int(i32::from(v)),
            ScalarKind::BigInt => Value::BigInt(i64::from(v)),
            _ => Value::TinyInt(v),
        },
        Value::SmallInt(v) => match kind {
            ScalarKind::Int => Value::Int(i32::from(v)),
            ScalarKind::BigInt => Value::BigInt(i64::from(v)),
            _ => Value::SmallInt(v),
        },
        Value::Int(v) if kind == ScalarKind::BigInt => Value::BigInt(i64::from(v)),
        Value::Real(v) if kind == ScalarKind::Float => Value::Float(f64::from(v)),
        Value::Date(date) if matches!(kind, ScalarKind::DateTime | ScalarKind::DateTime2) => {
            Value::DateTime(date.and_time(NaiveTime::MIN))
        }
        Value::Decimal(text) => {
            check_decimal(&text, target)?;
            Value::Decimal(text)
        }
        other => other,
    };
    Ok(value)
}

// Err carries the offending length.
fn fit_text(text: &str, descriptor: &TypeDescriptor) -> Result<String, usize> {
    let len = text.chars().count();
    if let Some(width) = descriptor.fixed_length() {
        if len > width {
            return Err(len);
        }
        let mut padded = String::with_capacity(text.len() + (width - len));
        padded.push_str(text);
        padded.extend(std::iter::repeat(' ').take(width - len));
        return Ok(padded);
    }
    match descriptor.length_limit() {
        Some(limit) if len > limit => Err(len),
        _ => Ok(text.to_string()),
    }
}

fn fit_bytes(bytes: &[u8], descriptor: &TypeDescriptor) -> Result<Vec<u8>, usize> {
    if let Some(width) = descriptor.fixed_length() {
        if bytes.len() > width {
            return Err(bytes.len());
        }
        let mut padded = bytes.to_vec();
        padded.resize(width, 0);
        return Ok(padded);
    }
    match descriptor.length_limit() {
        Some(limit) if bytes.len() > limit => Err(bytes.len()),
        _ => Ok(bytes.to_vec()),
    }
}

fn check_decimal(text: &str, descriptor: &TypeDescriptor) -> Result<(), Error> {
    let shape = DecimalShape::parse(text)
        .ok_or_else(|| Error::mismatch(descriptor.kind, "malformed decimal literal"))?;
    match descriptor.decimal_bounds() {
        Some((precision, scale)) if !shape.fits(precision, scale) => Err(Error::mismatch(
            format!("{}{}", descriptor.kind, bounds_suffix(descriptor)),
            format!(
                "{} integer and {} fraction digits",
                shape.integer_digits, shape.fraction_digits
            ),
        )),
        _ => Ok(()),
    }
}

fn describe(descriptor: &TypeDescriptor) -> String {
    let mut text = descriptor.kind.to_string();
    if let Some(length) = descriptor.max_length {
        text.push_str(&format!("({length})"));
    }
    text.push_str(&bounds_suffix(descriptor));
    if !descriptor.nullable {
        text.push_str(" not null");
    }
    text
}

fn bounds_suffix(descriptor: &TypeDescriptor) -> String {
    descriptor
        .decimal_bounds()
        .map(|(precision, scale)| format!("({precision},{scale})"))
        .unwrap_or_default()
}

fn over_length(descriptor: &TypeDescriptor, len: usize, unit: &str) -> Error {
    Error::InvalidParameter(format!(
        "{} value of {len} {unit} exceeds declared length {}",
        descriptor.kind,
        descriptor.max_length.unwrap_or_default()
    ))
}
