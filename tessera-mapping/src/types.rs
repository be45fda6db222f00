//! Value and wire type tags for mapped columns.
//!
//! `ValueType` is the semantic type of a record property; `WireType` is
//! the tag the binary bulk-load protocol needs. Each value type has a
//! fixed default wire type; explicit overrides are possible at column
//! declaration. Nullability is part of the value type
//! ([`ValueType::Optional`]), not a separate flag.

use serde::{Deserialize, Serialize};
use tessera_core::{RegistryVersion, Timestamp};
use uuid::Uuid;

/// Semantic value type of a mapped property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// 128-bit unique identifier
    Uuid,
    /// Variable-length text
    Text,
    /// 64-bit signed integer
    Int64,
    /// 32-bit signed integer
    Int32,
    /// 64-bit float
    Float64,
    /// Boolean
    Bool,
    /// Fixed-point decimal
    Decimal,
    /// Offset timestamp (stored with timezone)
    TimestampTz,
    /// Byte sequence
    Bytes,
    /// Structured JSON document
    Json,
    /// Nullable wrapper around any other value type
    Optional(Box<ValueType>),
}

impl ValueType {
    /// Nullable wrapper constructor.
    pub fn optional(inner: ValueType) -> Self {
        ValueType::Optional(Box::new(inner))
    }

    /// Whether NULL is a legal value for this type.
    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueType::Optional(_))
    }

    /// The fixed wire-type inference table. `Optional` defers to its
    /// inner type - NULLs are expressed per value, not per tag.
    pub fn wire_type(&self) -> WireType {
        match self {
            ValueType::Uuid => WireType::Uuid,
            ValueType::Text => WireType::Text,
            ValueType::Int64 => WireType::Int8,
            ValueType::Int32 => WireType::Int4,
            ValueType::Float64 => WireType::Float8,
            ValueType::Bool => WireType::Bool,
            ValueType::Decimal => WireType::Numeric,
            ValueType::TimestampTz => WireType::TimestampTz,
            ValueType::Bytes => WireType::Bytea,
            ValueType::Json => WireType::Jsonb,
            ValueType::Optional(inner) => inner.wire_type(),
        }
    }
}

/// Wire type tag handed to the binary bulk-load writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    Uuid,
    Text,
    Int8,
    Int4,
    Float8,
    Bool,
    Numeric,
    TimestampTz,
    Bytea,
    Jsonb,
}

/// A single column value crossing the driver boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Uuid(Uuid),
    Text(String),
    Int64(i64),
    Int32(i32),
    Float64(f64),
    Bool(bool),
    /// Decimal carried as its canonical string rendering; the driver
    /// owns the numeric wire encoding.
    Decimal(String),
    TimestampTz(Timestamp),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

/// Registration-time type descriptor for record properties.
///
/// Stands in for runtime reflection: the `map_columns!` macro asks each
/// listed field's Rust type for its value-type tag, and fixtures use
/// `into_value` to produce driver values without hand-matching.
pub trait ColumnType {
    fn value_type() -> ValueType;
    fn into_value(self) -> ColumnValue;
}

impl ColumnType for Uuid {
    fn value_type() -> ValueType {
        ValueType::Uuid
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Uuid(self)
    }
}

impl ColumnType for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Text(self)
    }
}

impl ColumnType for i64 {
    fn value_type() -> ValueType {
        ValueType::Int64
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Int64(self)
    }
}

impl ColumnType for i32 {
    fn value_type() -> ValueType {
        ValueType::Int32
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Int32(self)
    }
}

impl ColumnType for f64 {
    fn value_type() -> ValueType {
        ValueType::Float64
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Float64(self)
    }
}

impl ColumnType for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Bool(self)
    }
}

impl ColumnType for Timestamp {
    fn value_type() -> ValueType {
        ValueType::TimestampTz
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::TimestampTz(self)
    }
}

impl ColumnType for Vec<u8> {
    fn value_type() -> ValueType {
        ValueType::Bytes
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Bytes(self)
    }
}

impl ColumnType for serde_json::Value {
    fn value_type() -> ValueType {
        ValueType::Json
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Json(self)
    }
}

impl ColumnType for RegistryVersion {
    fn value_type() -> ValueType {
        ValueType::Int64
    }
    fn into_value(self) -> ColumnValue {
        ColumnValue::Int64(self.value())
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    fn value_type() -> ValueType {
        ValueType::optional(T::value_type())
    }
    fn into_value(self) -> ColumnValue {
        match self {
            Some(inner) => inner.into_value(),
            None => ColumnValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_wire_type_inference_table() {
        assert_eq!(ValueType::Uuid.wire_type(), WireType::Uuid);
        assert_eq!(ValueType::Text.wire_type(), WireType::Text);
        assert_eq!(ValueType::Int64.wire_type(), WireType::Int8);
        assert_eq!(ValueType::Int32.wire_type(), WireType::Int4);
        assert_eq!(ValueType::Float64.wire_type(), WireType::Float8);
        assert_eq!(ValueType::Bool.wire_type(), WireType::Bool);
        assert_eq!(ValueType::Decimal.wire_type(), WireType::Numeric);
        assert_eq!(ValueType::TimestampTz.wire_type(), WireType::TimestampTz);
        assert_eq!(ValueType::Bytes.wire_type(), WireType::Bytea);
        assert_eq!(ValueType::Json.wire_type(), WireType::Jsonb);
    }

    #[test]
    fn test_optional_defers_to_inner_wire_type() {
        let vt = ValueType::optional(ValueType::TimestampTz);
        assert!(vt.is_nullable());
        assert_eq!(vt.wire_type(), WireType::TimestampTz);
        assert!(!ValueType::TimestampTz.is_nullable());
    }

    #[test]
    fn test_option_column_type_maps_none_to_null() {
        let none: Option<String> = None;
        assert_eq!(none.into_value(), ColumnValue::Null);
        assert_eq!(
            Some("x".to_string()).into_value(),
            ColumnValue::Text("x".to_string())
        );
        assert_eq!(
            <Option<String> as ColumnType>::value_type(),
            ValueType::optional(ValueType::Text)
        );
    }

    #[test]
    fn test_registry_version_maps_to_int64() {
        let v = RegistryVersion::from_existing(42);
        assert_eq!(RegistryVersion::value_type(), ValueType::Int64);
        assert_eq!(v.into_value(), ColumnValue::Int64(42));
    }

    #[test]
    fn test_timestamp_maps_to_timestamptz() {
        let now = Utc::now();
        assert_eq!(Timestamp::value_type(), ValueType::TimestampTz);
        assert_eq!(now.into_value(), ColumnValue::TimestampTz(now));
    }
}
