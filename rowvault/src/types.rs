//! Scalar kinds, type descriptors and the value model.
//!
//! The set of kinds is closed: every kind has a stable lowercase wire tag and
//! unknown tags are rejected with `Error::UnknownTypeTag`.

use crate::error::Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATETIME_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// Largest decimal precision accepted in a descriptor.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Closed set of scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// Boolean.
    Bit,
    /// Unsigned 8-bit integer.
    TinyInt,
    /// Signed 16-bit integer.
    SmallInt,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    BigInt,
    /// Single-precision float.
    Real,
    /// Double-precision float.
    Float,
    /// Exact decimal with precision and scale.
    Decimal,
    /// Exact decimal(19,4).
    Money,
    /// Fixed-width text, space padded.
    Char,
    /// Fixed-width Unicode text, space padded.
    NChar,
    /// Variable-width text.
    VarChar,
    /// Variable-width Unicode text.
    NVarChar,
    /// Unbounded text.
    Text,
    /// Unbounded Unicode text.
    NText,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time without offset.
    DateTime,
    /// Date and time without offset, extended precision.
    DateTime2,
    /// Date and time with a UTC offset.
    DateTimeOffset,
    /// GUID.
    UniqueIdentifier,
    /// Fixed-width binary, zero padded.
    Binary,
    /// Variable-width binary.
    VarBinary,
}

impl ScalarKind {
    /// Every kind, in wire-tag order.
    pub const ALL: [Self; 23] = [
        Self::Bit,
        Self::TinyInt,
        Self::SmallInt,
        Self::Int,
        Self::BigInt,
        Self::Real,
        Self::Float,
        Self::Decimal,
        Self::Money,
        Self::Char,
        Self::NChar,
        Self::VarChar,
        Self::NVarChar,
        Self::Text,
        Self::NText,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::DateTime2,
        Self::DateTimeOffset,
        Self::UniqueIdentifier,
        Self::Binary,
        Self::VarBinary,
    ];

    /// Returns the stable wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Money => "money",
            Self::Char => "char",
            Self::NChar => "nchar",
            Self::VarChar => "varchar",
            Self::NVarChar => "nvarchar",
            Self::Text => "text",
            Self::NText => "ntext",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::DateTime2 => "datetime2",
            Self::DateTimeOffset => "datetimeoffset",
            Self::UniqueIdentifier => "uniqueidentifier",
            Self::Binary => "binary",
            Self::VarBinary => "varbinary",
        }
    }

    /// Text kinds.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            Self::Char | Self::NChar | Self::VarChar | Self::NVarChar | Self::Text | Self::NText
        )
    }

    /// Binary kinds.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Binary | Self::VarBinary)
    }

    /// Kinds whose non-null values always have exactly the declared length.
    #[must_use]
    pub const fn is_fixed_width(self) -> bool {
        matches!(self, Self::Char | Self::NChar | Self::Binary)
    }

    /// Kinds that honour a declared maximum length.
    #[must_use]
    pub const fn has_length(self) -> bool {
        self.is_binary()
            || matches!(self, Self::Char | Self::NChar | Self::VarChar | Self::NVarChar)
    }

    const fn integer_rank(self) -> Option<u8> {
        match self {
            Self::TinyInt => Some(0),
            Self::SmallInt => Some(1),
            Self::Int => Some(2),
            Self::BigInt => Some(3),
            _ => None,
        }
    }

    /// Whether a value stored under `self` may be decoded as `target`.
    ///
    /// Coercions never lose information: text to text, integer widening,
    /// `Real` to `Float`, date to datetime, datetime flavours, decimal flavours
    /// and binary flavours.
    #[must_use]
    pub fn coercible_to(self, target: Self) -> bool {
        if self == target {
            return true;
        }
        if let (Some(from), Some(to)) = (self.integer_rank(), target.integer_rank()) {
            return from <= to;
        }
        matches!(
            (self, target),
            (Self::Real, Self::Float)
                | (Self::Decimal | Self::Money, Self::Decimal | Self::Money)
                | (Self::Date, Self::DateTime | Self::DateTime2)
                | (Self::DateTime | Self::DateTime2, Self::DateTime | Self::DateTime2)
                | (Self::Binary | Self::VarBinary, Self::Binary | Self::VarBinary)
        ) || (self.is_text() && target.is_text())
    }

    /// Whether `value` has the shape this kind stores. `Null` is accepted by
    /// every kind; nullability is a descriptor concern.
    #[must_use]
    pub const fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Bool(_) => matches!(self, Self::Bit),
            Value::TinyInt(_) => matches!(self, Self::TinyInt),
            Value::SmallInt(_) => matches!(self, Self::SmallInt),
            Value::Int(_) => matches!(self, Self::Int),
            Value::BigInt(_) => matches!(self, Self::BigInt),
            Value::Real(_) => matches!(self, Self::Real),
            Value::Float(_) => matches!(self, Self::Float),
            Value::Decimal(_) => matches!(self, Self::Decimal | Self::Money),
            Value::Text(_) => self.is_text(),
            Value::Bytes(_) => self.is_binary(),
            Value::Date(_) => matches!(self, Self::Date),
            Value::Time(_) => matches!(self, Self::Time),
            Value::DateTime(_) => matches!(self, Self::DateTime | Self::DateTime2),
            Value::DateTimeOffset(_) => matches!(self, Self::DateTimeOffset),
            Value::Guid(_) => matches!(self, Self::UniqueIdentifier),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let lowered = tag.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| Error::UnknownTypeTag(tag.to_string()))
    }
}

impl Serialize for ScalarKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ScalarKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

/// Type attributes that travel with a value.
///
/// # Example
///
/// ```
/// use rowvault::types::{ScalarKind, TypeDescriptor};
///
/// let descriptor = TypeDescriptor::new(ScalarKind::Char).with_max_length(5).not_null();
/// assert_eq!(descriptor.fixed_length(), Some(5));
/// assert!(!descriptor.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Scalar kind.
    #[serde(rename = "type")]
    pub kind: ScalarKind,
    /// Whether null is a legal value.
    #[serde(default = "nullable_by_default")]
    pub nullable: bool,
    /// Declared length in characters (text) or bytes (binary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Decimal precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    /// Decimal scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
}

const fn nullable_by_default() -> bool {
    true
}

impl TypeDescriptor {
    /// Creates a nullable descriptor with no length or precision.
    #[must_use]
    pub const fn new(kind: ScalarKind) -> Self {
        Self { kind, nullable: true, max_length: None, precision: None, scale: None }
    }

    /// Marks the descriptor non-nullable.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the declared length.
    #[must_use]
    pub const fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets decimal precision and scale.
    #[must_use]
    pub const fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Declared width for fixed-width kinds.
    #[must_use]
    pub fn fixed_length(&self) -> Option<usize> {
        if self.kind.is_fixed_width() {
            self.max_length.map(|len| len as usize)
        } else {
            None
        }
    }

    /// Length limit for variable-width kinds (`None` means unbounded).
    #[must_use]
    pub fn length_limit(&self) -> Option<usize> {
        if self.kind.has_length() {
            self.max_length.map(|len| len as usize)
        } else {
            None
        }
    }

    /// Precision and scale in effect; `Money` is always decimal(19,4).
    #[must_use]
    pub const fn decimal_bounds(&self) -> Option<(u8, u8)> {
        match (self.kind, self.precision) {
            (ScalarKind::Money, _) => Some((19, 4)),
            (ScalarKind::Decimal, Some(precision)) => match self.scale {
                Some(scale) => Some((precision, scale)),
                None => Some((precision, 0)),
            },
            _ => None,
        }
    }

    /// Checks that the attributes make sense for the kind.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` when a fixed-width kind lacks a
    /// positive length or decimal precision/scale are out of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.kind.is_fixed_width() && !matches!(self.max_length, Some(len) if len > 0) {
            return Err(Error::InvalidParameter(format!(
                "{} requires a positive declared length",
                self.kind
            )));
        }
        if let Some(precision) = self.precision {
            let scale = self.scale.unwrap_or(0);
            if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision {
                return Err(Error::InvalidParameter(format!(
                    "{} precision {precision} scale {scale} out of range",
                    self.kind
                )));
            }
        }
        Ok(())
    }
}

/// A scalar value.
///
/// `Decimal` keeps its exact invariant text so trailing zeros and scale
/// survive a round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL null.
    Null,
    /// `bit`.
    Bool(bool),
    /// `tinyint`.
    TinyInt(u8),
    /// `smallint`.
    SmallInt(i16),
    /// `int`.
    Int(i32),
    /// `bigint`.
    BigInt(i64),
    /// `real`.
    Real(f32),
    /// `float`.
    Float(f64),
    /// `decimal` / `money` as invariant decimal text.
    Decimal(String),
    /// Any text kind.
    Text(String),
    /// Any binary kind.
    Bytes(Vec<u8>),
    /// `date`.
    Date(NaiveDate),
    /// `time`.
    Time(NaiveTime),
    /// `datetime` / `datetime2`.
    DateTime(NaiveDateTime),
    /// `datetimeoffset`.
    DateTimeOffset(DateTime<FixedOffset>),
    /// `uniqueidentifier`.
    Guid(Uuid),
}

impl Value {
    /// Short shape name for error messages; never includes the value itself.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::TinyInt(_) => "tinyint",
            Self::SmallInt(_) => "smallint",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Real(_) => "real",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::DateTimeOffset(_) => "datetimeoffset",
            Self::Guid(_) => "guid",
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Formats the value as locale-independent literal text.
    ///
    /// Returns `None` for null. Binary values become standard base64.
    #[must_use]
    pub fn to_literal(&self) -> Option<String> {
        Some(match self {
            Self::Null => return None,
            Self::Bool(value) => value.to_string(),
            Self::TinyInt(value) => value.to_string(),
            Self::SmallInt(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::BigInt(value) => value.to_string(),
            Self::Real(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Decimal(text) | Self::Text(text) => text.clone(),
            Self::Bytes(bytes) => STANDARD.encode(bytes),
            Self::Date(date) => date.format(DATE_FORMAT).to_string(),
            Self::Time(time) => time.format(TIME_FORMAT).to_string(),
            Self::DateTime(datetime) => datetime.format(DATETIME_FORMAT).to_string(),
            Self::DateTimeOffset(datetime) => datetime.format(DATETIME_OFFSET_FORMAT).to_string(),
            Self::Guid(guid) => guid.hyphenated().to_string(),
        })
    }

    /// Parses literal text produced by [`Value::to_literal`] for `kind`.
    ///
    /// The kind alone decides the interpretation: text is never guessed to be
    /// base64 and binary literals are always base64.
    ///
    /// # Errors
    ///
    /// Returns `Error::TypeMismatch` if the literal is not valid for `kind`.
    pub fn parse_literal(kind: ScalarKind, literal: &str) -> Result<Self, Error> {
        let malformed = || Error::mismatch(kind, format!("malformed {kind} literal"));
        let value = match kind {
            ScalarKind::Bit => match literal {
                "true" | "1" => Self::Bool(true),
                "false" | "0" => Self::Bool(false),
                _ => return Err(malformed()),
            },
            ScalarKind::TinyInt => Self::TinyInt(literal.parse().map_err(|_| malformed())?),
            ScalarKind::SmallInt => Self::SmallInt(literal.parse().map_err(|_| malformed())?),
            ScalarKind::Int => Self::Int(literal.parse().map_err(|_| malformed())?),
            ScalarKind::BigInt => Self::BigInt(literal.parse().map_err(|_| malformed())?),
            ScalarKind::Real => Self::Real(literal.parse().map_err(|_| malformed())?),
            ScalarKind::Float => Self::Float(literal.parse().map_err(|_| malformed())?),
            ScalarKind::Decimal | ScalarKind::Money => {
                DecimalShape::parse(literal).ok_or_else(malformed)?;
                Self::Decimal(literal.to_string())
            }
            kind if kind.is_text() => Self::Text(literal.to_string()),
            ScalarKind::Binary | ScalarKind::VarBinary => {
                Self::Bytes(STANDARD.decode(literal).map_err(|_| malformed())?)
            }
            ScalarKind::Date => Self::Date(
                NaiveDate::parse_from_str(literal, DATE_FORMAT).map_err(|_| malformed())?,
            ),
            ScalarKind::Time => Self::Time(
                NaiveTime::parse_from_str(literal, TIME_FORMAT).map_err(|_| malformed())?,
            ),
            ScalarKind::DateTime | ScalarKind::DateTime2 => Self::DateTime(
                NaiveDateTime::parse_from_str(literal, DATETIME_FORMAT).map_err(|_| malformed())?,
            ),
            ScalarKind::DateTimeOffset => Self::DateTimeOffset(
                DateTime::parse_from_str(literal, DATETIME_OFFSET_FORMAT)
                    .map_err(|_| malformed())?,
            ),
            ScalarKind::UniqueIdentifier => {
                Self::Guid(Uuid::parse_str(literal).map_err(|_| malformed())?)
            }
            _ => return Err(malformed()),
        };
        Ok(value)
    }
}

/// Digit counts of a decimal literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecimalShape {
    /// Significant digits before the decimal point.
    pub integer_digits: usize,
    /// Digits after the decimal point.
    pub fraction_digits: usize,
}

impl DecimalShape {
    /// Parses `[+-]digits[.digits]`, requiring at least one digit.
    pub(crate) fn parse(literal: &str) -> Option<Self> {
        let unsigned = literal.strip_prefix(['-', '+']).unwrap_or(literal);
        let (integer, fraction) = match unsigned.split_once('.') {
            Some((integer, fraction)) => (integer, fraction),
            None => (unsigned, ""),
        };
        let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }
        if !all_digits(integer) || !all_digits(fraction) {
            return None;
        }
        Some(Self {
            integer_digits: integer.trim_start_matches('0').len(),
            fraction_digits: fraction.len(),
        })
    }

    /// Whether the literal fits decimal(`precision`, `scale`).
    pub(crate) const fn fits(self, precision: u8, scale: u8) -> bool {
        self.fraction_digits <= scale as usize
            && self.integer_digits <= (precision as usize).saturating_sub(scale as usize)
    }
}

/// A value together with the type attributes that describe it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarValue {
    /// Type attributes.
    pub descriptor: TypeDescriptor,
    /// The value.
    pub value: Value,
}

impl ScalarValue {
    /// Pairs a value with its descriptor.
    #[must_use]
    pub const fn new(descriptor: TypeDescriptor, value: Value) -> Self {
        Self { descriptor, value }
    }

    /// A null of the described type.
    #[must_use]
    pub const fn null(descriptor: TypeDescriptor) -> Self {
        Self { descriptor, value: Value::Null }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tags_round_trip() {
        for kind in ScalarKind::ALL {
            assert_eq!(kind.as_str().parse::<ScalarKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_tag_parse_is_case_insensitive() {
        assert_eq!("NVarChar".parse::<ScalarKind>().unwrap(), ScalarKind::NVarChar);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(matches!("geography".parse::<ScalarKind>(), Err(Error::UnknownTypeTag(_))));
    }

    #[test]
    fn test_kind_serde_uses_wire_tag() {
        let json = serde_json::to_string(&ScalarKind::DateTimeOffset).unwrap();
        assert_eq!(json, "\"datetimeoffset\"");
        assert!(serde_json::from_str::<ScalarKind>("\"xml\"").is_err());
    }

    #[test]
    fn test_coercion_rules() {
        assert!(ScalarKind::TinyInt.coercible_to(ScalarKind::BigInt));
        assert!(!ScalarKind::BigInt.coercible_to(ScalarKind::Int));
        assert!(ScalarKind::VarChar.coercible_to(ScalarKind::NChar));
        assert!(ScalarKind::Real.coercible_to(ScalarKind::Float));
        assert!(!ScalarKind::Float.coercible_to(ScalarKind::Real));
        assert!(ScalarKind::Date.coercible_to(ScalarKind::DateTime2));
        assert!(!ScalarKind::VarBinary.coercible_to(ScalarKind::VarChar));
        assert!(!ScalarKind::NVarChar.coercible_to(ScalarKind::VarBinary));
        assert!(!ScalarKind::Int.coercible_to(ScalarKind::NVarChar));
    }

    #[test]
    fn test_accepts_matches_shapes() {
        assert!(ScalarKind::Char.accepts(&Value::Text("x".into())));
        assert!(ScalarKind::Money.accepts(&Value::Decimal("1.0000".into())));
        assert!(!ScalarKind::Int.accepts(&Value::BigInt(1)));
        assert!(!ScalarKind::VarBinary.accepts(&Value::Text("AAEC".into())));
        assert!(ScalarKind::Int.accepts(&Value::Null));
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(TypeDescriptor::new(ScalarKind::Char).validate().is_err());
        assert!(TypeDescriptor::new(ScalarKind::Char).with_max_length(0).validate().is_err());
        assert!(TypeDescriptor::new(ScalarKind::Char).with_max_length(3).validate().is_ok());
        assert!(TypeDescriptor::new(ScalarKind::Decimal).with_precision(5, 6).validate().is_err());
        assert!(TypeDescriptor::new(ScalarKind::Decimal).with_precision(39, 2).validate().is_err());
        assert!(TypeDescriptor::new(ScalarKind::VarChar).validate().is_ok());
    }

    #[test]
    fn test_money_bounds_are_fixed() {
        let money = TypeDescriptor::new(ScalarKind::Money).with_precision(5, 0);
        assert_eq!(money.decimal_bounds(), Some((19, 4)));
        assert_eq!(TypeDescriptor::new(ScalarKind::Decimal).decimal_bounds(), None);
    }

    #[test]
    fn test_literals_round_trip() {
        let offset = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let values = [
            (ScalarKind::Bit, Value::Bool(true)),
            (ScalarKind::TinyInt, Value::TinyInt(255)),
            (ScalarKind::SmallInt, Value::SmallInt(-32_768)),
            (ScalarKind::Int, Value::Int(i32::MIN)),
            (ScalarKind::BigInt, Value::BigInt(i64::MAX)),
            (ScalarKind::Real, Value::Real(0.1)),
            (ScalarKind::Float, Value::Float(1.0 / 3.0)),
            (ScalarKind::Decimal, Value::Decimal("-0012.3400".into())),
            (ScalarKind::NVarChar, Value::Text("  ünïcødé \t".into())),
            (ScalarKind::VarBinary, Value::Bytes(vec![0, 255, 10, 13])),
            (ScalarKind::Date, Value::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())),
            (
                ScalarKind::Time,
                Value::Time(NaiveTime::from_hms_nano_opt(23, 59, 59, 123_456_700).unwrap()),
            ),
            (
                ScalarKind::DateTime2,
                Value::DateTime(
                    NaiveDate::from_ymd_opt(2024, 2, 29)
                        .unwrap()
                        .and_hms_micro_opt(1, 2, 3, 4)
                        .unwrap(),
                ),
            ),
            (
                ScalarKind::DateTimeOffset,
                Value::DateTimeOffset(offset.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()),
            ),
            (
                ScalarKind::UniqueIdentifier,
                Value::Guid(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef)),
            ),
        ];

        for (kind, value) in values {
            let literal = value.to_literal().expect("non-null literal");
            let parsed = Value::parse_literal(kind, &literal).expect("literal must parse");
            assert_eq!(parsed, value, "{kind}");
        }
    }

    #[test]
    fn test_binary_literal_requires_base64() {
        assert!(matches!(
            Value::parse_literal(ScalarKind::VarBinary, "not base64!"),
            Err(Error::TypeMismatch { .. })
        ));
        // The same text is an ordinary string under a text kind.
        assert_eq!(
            Value::parse_literal(ScalarKind::VarChar, "AAEC").unwrap(),
            Value::Text("AAEC".into())
        );
    }

    #[test]
    fn test_malformed_literal_does_not_echo_value() {
        let err = Value::parse_literal(ScalarKind::Int, "secret-123").unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_decimal_shape() {
        let shape = DecimalShape::parse("-0012.340").unwrap();
        assert_eq!(shape, DecimalShape { integer_digits: 2, fraction_digits: 3 });
        assert!(shape.fits(5, 3));
        assert!(!shape.fits(4, 3));
        assert!(DecimalShape::parse(".5").is_some());
        assert!(DecimalShape::parse("1e5").is_none());
        assert!(DecimalShape::parse("-").is_none());
        assert!(DecimalShape::parse("1,5").is_none());
    }
}
