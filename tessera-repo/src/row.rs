//! Driver-neutral result rows and record rehydration.

use tessera_core::{RegistryVersion, RepositoryError, TesseraResult, Timestamp};
use tessera_mapping::ColumnValue;
use uuid::Uuid;

/// One result row: column values keyed by the logical property name the
/// SELECT aliased them to, in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, ColumnValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(columns: Vec<(String, ColumnValue)>) -> Self {
        Self { columns }
    }

    pub fn push(&mut self, name: impl Into<String>, value: ColumnValue) {
        self.columns.push((name.into(), value));
    }

    pub fn columns(&self) -> &[(String, ColumnValue)] {
        &self.columns
    }

    /// Raw value of a column; missing columns are loud.
    pub fn get(&self, name: &str) -> TesseraResult<&ColumnValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| {
                RepositoryError::MissingColumn {
                    column: name.to_string(),
                }
                .into()
            })
    }

    fn decode_error(name: &str, value: &ColumnValue, expected: &str) -> tessera_core::TesseraError {
        RepositoryError::Decode {
            column: name.to_string(),
            reason: format!("expected {}, got {:?}", expected, value),
        }
        .into()
    }

    pub fn get_uuid(&self, name: &str) -> TesseraResult<Uuid> {
        match self.get(name)? {
            ColumnValue::Uuid(v) => Ok(*v),
            other => Err(Self::decode_error(name, other, "uuid")),
        }
    }

    pub fn get_text(&self, name: &str) -> TesseraResult<String> {
        match self.get(name)? {
            ColumnValue::Text(v) => Ok(v.clone()),
            other => Err(Self::decode_error(name, other, "text")),
        }
    }

    pub fn get_i64(&self, name: &str) -> TesseraResult<i64> {
        match self.get(name)? {
            ColumnValue::Int64(v) => Ok(*v),
            other => Err(Self::decode_error(name, other, "int64")),
        }
    }

    pub fn get_i32(&self, name: &str) -> TesseraResult<i32> {
        match self.get(name)? {
            ColumnValue::Int32(v) => Ok(*v),
            other => Err(Self::decode_error(name, other, "int32")),
        }
    }

    pub fn get_f64(&self, name: &str) -> TesseraResult<f64> {
        match self.get(name)? {
            ColumnValue::Float64(v) => Ok(*v),
            other => Err(Self::decode_error(name, other, "float64")),
        }
    }

    pub fn get_bool(&self, name: &str) -> TesseraResult<bool> {
        match self.get(name)? {
            ColumnValue::Bool(v) => Ok(*v),
            other => Err(Self::decode_error(name, other, "bool")),
        }
    }

    pub fn get_timestamp(&self, name: &str) -> TesseraResult<Timestamp> {
        match self.get(name)? {
            ColumnValue::TimestampTz(v) => Ok(*v),
            other => Err(Self::decode_error(name, other, "timestamptz")),
        }
    }

    pub fn get_version(&self, name: &str) -> TesseraResult<RegistryVersion> {
        Ok(RegistryVersion::from_existing(self.get_i64(name)?))
    }

    /// Nullable text column: NULL becomes `None`.
    pub fn opt_text(&self, name: &str) -> TesseraResult<Option<String>> {
        match self.get(name)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::Text(v) => Ok(Some(v.clone())),
            other => Err(Self::decode_error(name, other, "text or null")),
        }
    }

    pub fn opt_uuid(&self, name: &str) -> TesseraResult<Option<Uuid>> {
        match self.get(name)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::Uuid(v) => Ok(Some(*v)),
            other => Err(Self::decode_error(name, other, "uuid or null")),
        }
    }

    pub fn opt_timestamp(&self, name: &str) -> TesseraResult<Option<Timestamp>> {
        match self.get(name)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::TimestampTz(v) => Ok(Some(*v)),
            other => Err(Self::decode_error(name, other, "timestamptz or null")),
        }
    }

    pub fn opt_f64(&self, name: &str) -> TesseraResult<Option<f64>> {
        match self.get(name)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::Float64(v) => Ok(Some(*v)),
            other => Err(Self::decode_error(name, other, "float64 or null")),
        }
    }

    pub fn opt_json(&self, name: &str) -> TesseraResult<Option<serde_json::Value>> {
        match self.get(name)? {
            ColumnValue::Null => Ok(None),
            ColumnValue::Json(v) => Ok(Some(v.clone())),
            other => Err(Self::decode_error(name, other, "json or null")),
        }
    }
}

/// Rehydrate a record from a result row. Column names are the logical
/// property names the SELECT aliased them to.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> TesseraResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::TesseraError;

    fn sample() -> Row {
        Row::from_pairs(vec![
            ("id".to_string(), ColumnValue::Uuid(Uuid::nil())),
            ("name".to_string(), ColumnValue::Text("anchor".to_string())),
            ("entity_version".to_string(), ColumnValue::Int64(7)),
            ("changed_by".to_string(), ColumnValue::Null),
        ])
    }

    #[test]
    fn test_typed_accessors() {
        let row = sample();
        assert_eq!(row.get_uuid("id").unwrap(), Uuid::nil());
        assert_eq!(row.get_text("name").unwrap(), "anchor");
        assert_eq!(
            row.get_version("entity_version").unwrap(),
            RegistryVersion::from_existing(7)
        );
        assert_eq!(row.opt_text("changed_by").unwrap(), None);
    }

    #[test]
    fn test_missing_column_is_loud() {
        let row = sample();
        assert!(matches!(
            row.get_text("nope"),
            Err(TesseraError::Repository(
                RepositoryError::MissingColumn { .. }
            ))
        ));
    }

    #[test]
    fn test_type_mismatch_is_a_decode_error() {
        let row = sample();
        assert!(matches!(
            row.get_i64("name"),
            Err(TesseraError::Repository(RepositoryError::Decode { .. }))
        ));
        // NULL is not silently coerced for non-optional accessors.
        assert!(row.get_text("changed_by").is_err());
    }
}
