//! Declared type tags for registered properties.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar data types understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Point in time.
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
    /// Opaque structured value, stored serialized.
    Json,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64 | ScalarType::Decimal { .. }
        )
    }

    /// Type name used by document stores.
    pub fn document_type(&self) -> &'static str {
        match self {
            ScalarType::Bool => "Boolean",
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64 => "Number",
            ScalarType::Decimal { .. } => "Decimal128",
            ScalarType::String | ScalarType::Uuid => "String",
            ScalarType::Bytes => "Buffer",
            ScalarType::Timestamp => "Date",
            ScalarType::Json => "Mixed",
        }
    }

    /// Type name used by labeled-property-graph stores.
    pub fn graph_type(&self) -> &'static str {
        match self {
            ScalarType::Bool => "boolean",
            ScalarType::Int32 | ScalarType::Int64 => "integer",
            ScalarType::Float64 | ScalarType::Decimal { .. } => "float",
            ScalarType::String | ScalarType::Uuid => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Timestamp => "datetime",
            ScalarType::Json => "object",
        }
    }

    /// Column type used by relational stores.
    pub fn sql_type(&self) -> String {
        match self {
            ScalarType::Bool => "boolean".into(),
            ScalarType::Int32 => "integer".into(),
            ScalarType::Int64 => "bigint".into(),
            ScalarType::Float64 => "double precision".into(),
            ScalarType::Decimal { precision, scale } => format!("numeric({},{})", precision, scale),
            ScalarType::String => "varchar".into(),
            ScalarType::Bytes => "bytea".into(),
            ScalarType::Timestamp => "timestamptz".into(),
            ScalarType::Uuid => "uuid".into(),
            ScalarType::Json => "jsonb".into(),
        }
    }
}

/// A single member of an enumerated value set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    /// Numeric member.
    Int(i64),
    /// Text member.
    Text(String),
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::Int(i) => write!(f, "{}", i),
            EnumValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for EnumValue {
    fn from(value: &str) -> Self {
        EnumValue::Text(value.to_string())
    }
}

impl From<String> for EnumValue {
    fn from(value: String) -> Self {
        EnumValue::Text(value)
    }
}

impl From<i64> for EnumValue {
    fn from(value: i64) -> Self {
        EnumValue::Int(value)
    }
}

impl From<i32> for EnumValue {
    fn from(value: i32) -> Self {
        EnumValue::Int(value as i64)
    }
}

/// An ordered, finite set of allowed values.
///
/// Members are either all numeric or all text; mixed sets are rejected at
/// registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnumValues(Vec<EnumValue>);

impl EnumValues {
    /// Create a value set from its members.
    pub fn new(values: impl IntoIterator<Item = impl Into<EnumValue>>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Members in declaration order.
    pub fn values(&self) -> &[EnumValue] {
        &self.0
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if every member is numeric.
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| matches!(v, EnumValue::Int(_)))
    }

    /// Check if every member is text.
    pub fn is_text(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| matches!(v, EnumValue::Text(_)))
    }

    /// Scalar type the set is stored as.
    pub fn scalar_type(&self) -> ScalarType {
        if self.is_numeric() {
            ScalarType::Int64
        } else {
            ScalarType::String
        }
    }

    /// Describe why this set cannot be registered, if it cannot.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("enumerated value set is empty".into());
        }
        if !self.is_numeric() && !self.is_text() {
            return Err("enumerated value set mixes numeric and text members".into());
        }
        Ok(())
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// A plain scalar.
    Scalar(ScalarType),
    /// A domain identifier wrapper; stored as a string in every backend.
    Identifier,
    /// A finite fixed-value constant set.
    Enumeration {
        /// Name of the enumerated type.
        name: String,
        /// Members of the set.
        values: EnumValues,
    },
    /// A collection of another declared type.
    Array(Box<TypeDescriptor>),
    /// A reference to another registered class.
    Class(String),
}

impl TypeDescriptor {
    /// Create a scalar type.
    pub fn scalar(scalar: ScalarType) -> Self {
        TypeDescriptor::Scalar(scalar)
    }

    /// Create an array of the given element type.
    pub fn array(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    /// Create a class reference.
    pub fn class(name: impl Into<String>) -> Self {
        TypeDescriptor::Class(name.into())
    }

    /// Create an enumerated constant set.
    pub fn enumeration(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<EnumValue>>,
    ) -> Self {
        TypeDescriptor::Enumeration {
            name: name.into(),
            values: EnumValues::new(values),
        }
    }

    /// Check if this type is a collection.
    pub fn is_array(&self) -> bool {
        matches!(self, TypeDescriptor::Array(_))
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            TypeDescriptor::Enumeration { values, name } => values
                .validate()
                .map_err(|e| format!("enumeration {}: {}", name, e)),
            TypeDescriptor::Array(inner) => inner.validate(),
            TypeDescriptor::Class(name) if name.is_empty() => {
                Err("class reference with empty name".into())
            }
            _ => Ok(()),
        }
    }
}

/// Default value applied when a property is not provided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Current timestamp (evaluated at insert time).
    CurrentTimestamp,
    /// Auto-generated UUID.
    AutoUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_scalar_resolution() {
        let text = EnumValues::new(["A", "B"]);
        assert!(text.is_text());
        assert_eq!(text.scalar_type(), ScalarType::String);

        let numeric = EnumValues::new([1i64, 2, 3]);
        assert!(numeric.is_numeric());
        assert_eq!(numeric.scalar_type(), ScalarType::Int64);
    }

    #[test]
    fn test_enum_validation() {
        assert!(EnumValues::new(Vec::<EnumValue>::new()).validate().is_err());

        let mixed = EnumValues::new(vec![EnumValue::Int(1), EnumValue::from("a")]);
        assert!(mixed.validate().is_err());
        assert!(EnumValues::new(["x"]).validate().is_ok());
    }

    #[test]
    fn test_backend_type_names() {
        assert_eq!(ScalarType::String.document_type(), "String");
        assert_eq!(ScalarType::Timestamp.graph_type(), "datetime");
        assert_eq!(
            ScalarType::Decimal {
                precision: 10,
                scale: 2
            }
            .sql_type(),
            "numeric(10,2)"
        );
    }

    #[test]
    fn test_type_descriptor_json() {
        let ty: TypeDescriptor =
            serde_json::from_str(r#"{"array": {"scalar": "string"}}"#).unwrap();
        assert_eq!(ty, TypeDescriptor::array(TypeDescriptor::scalar(ScalarType::String)));

        let ty: TypeDescriptor =
            serde_json::from_str(r#"{"enumeration": {"name": "Level", "values": [1, 2]}}"#)
                .unwrap();
        assert_eq!(ty, TypeDescriptor::enumeration("Level", [1i64, 2]));
    }
}
