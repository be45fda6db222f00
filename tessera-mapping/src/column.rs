//! Table and column mapping configuration.
//!
//! A [`TableMapping`] is the frozen schema/table/column description for
//! one record type: schema and table identity plus an ordered,
//! name-indexed column collection. Insertion order is significant - it
//! fixes the column order of the COPY command and of the bulk columnar
//! writer, so the base column set is always injected first, in a fixed
//! framework-defined order, before any custom columns.

use crate::types::{ColumnType, ValueType, WireType};
use std::collections::HashMap;
use tessera_core::{MappingError, RecordId, RegistryVersion, TesseraResult};

/// Property and column names of the fixed base column set.
///
/// Every mapped table carries these thirteen columns, in this order,
/// before its business columns.
pub mod base {
    pub const ID: &str = "id";
    pub const TENANT_CODE: &str = "tenant_code";
    pub const CREATED_BY: &str = "created_by";
    pub const CREATED_AT: &str = "created_at";
    pub const CREATED_ORIGIN: &str = "created_origin";
    pub const CREATED_CORRELATION: &str = "created_correlation";
    pub const CREATED_OPERATION: &str = "created_operation";
    pub const CHANGED_BY: &str = "changed_by";
    pub const CHANGED_AT: &str = "changed_at";
    pub const CHANGED_ORIGIN: &str = "changed_origin";
    pub const CHANGED_CORRELATION: &str = "changed_correlation";
    pub const CHANGED_OPERATION: &str = "changed_operation";
    pub const ENTITY_VERSION: &str = "entity_version";

    /// Total number of base columns preceding custom columns.
    pub const NUM_BASE_COLS: usize = 13;
}

/// One column: logical property name, storage column name, semantic
/// value type, wire type tag. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub property: String,
    pub column: String,
    pub value_type: ValueType,
    pub wire_type: WireType,
}

impl ColumnMapping {
    /// Create a mapping with the wire type inferred from the value type.
    pub fn new(
        property: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        let wire_type = value_type.wire_type();
        Self {
            property: property.into(),
            column: column.into(),
            value_type,
            wire_type,
        }
    }

    /// Create a mapping with an explicit wire type override.
    pub fn with_wire_type(
        property: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
        wire_type: WireType,
    ) -> Self {
        Self {
            property: property.into(),
            column: column.into(),
            value_type,
            wire_type,
        }
    }
}

/// The frozen schema/table/column description for one record type.
///
/// Built exactly once per type (memoized by the registry), read-only
/// and shared across all callers thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    schema: Option<String>,
    table: String,
    columns: Vec<ColumnMapping>,
    index: HashMap<String, usize>,
}

impl TableMapping {
    /// Start a builder for the given schema/table identity. The schema
    /// may be omitted, yielding an unqualified table name.
    pub fn builder(schema: Option<&str>, table: &str) -> TableMappingBuilder {
        TableMappingBuilder::new(schema, table)
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `"schema.table"`, or `"table"` when no schema is set.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }

    /// All columns in declaration order (base columns first).
    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// Look up a column by logical property name. Unknown names are a
    /// configuration error, reported loudly.
    pub fn column_for(&self, property: &str) -> TesseraResult<&ColumnMapping> {
        self.index
            .get(property)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| {
                MappingError::UnknownProperty {
                    table: self.table.clone(),
                    property: property.to_string(),
                }
                .into()
            })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Builder populated once per record type.
///
/// Errors (duplicate property, empty table name) are deferred so
/// declarations can chain; `build()` reports the first one.
#[derive(Debug)]
pub struct TableMappingBuilder {
    schema: Option<String>,
    table: String,
    columns: Vec<ColumnMapping>,
    index: HashMap<String, usize>,
    error: Option<MappingError>,
}

impl TableMappingBuilder {
    fn new(schema: Option<&str>, table: &str) -> Self {
        let mut builder = Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
            columns: Vec::new(),
            index: HashMap::new(),
            error: None,
        };
        builder.push_base_columns();
        builder
    }

    /// The framework-defined base set, injected before custom columns.
    fn push_base_columns(&mut self) {
        use ValueType::*;
        self.push(ColumnMapping::new(base::ID, base::ID, Uuid));
        self.push(ColumnMapping::new(base::TENANT_CODE, base::TENANT_CODE, Text));
        for (by, at, origin, correlation, operation) in [
            (
                base::CREATED_BY,
                base::CREATED_AT,
                base::CREATED_ORIGIN,
                base::CREATED_CORRELATION,
                base::CREATED_OPERATION,
            ),
            (
                base::CHANGED_BY,
                base::CHANGED_AT,
                base::CHANGED_ORIGIN,
                base::CHANGED_CORRELATION,
                base::CHANGED_OPERATION,
            ),
        ] {
            self.push(ColumnMapping::new(by, by, ValueType::optional(Text)));
            self.push(ColumnMapping::new(at, at, ValueType::optional(TimestampTz)));
            self.push(ColumnMapping::new(origin, origin, ValueType::optional(Text)));
            self.push(ColumnMapping::new(
                correlation,
                correlation,
                ValueType::optional(Uuid),
            ));
            self.push(ColumnMapping::new(
                operation,
                operation,
                ValueType::optional(Text),
            ));
        }
        self.push(ColumnMapping::new(
            base::ENTITY_VERSION,
            base::ENTITY_VERSION,
            Int64,
        ));
    }

    fn push(&mut self, mapping: ColumnMapping) {
        if self.error.is_some() {
            return;
        }
        if self.index.contains_key(&mapping.property) {
            self.error = Some(MappingError::DuplicateColumn {
                table: self.table.clone(),
                property: mapping.property,
            });
            return;
        }
        self.index
            .insert(mapping.property.clone(), self.columns.len());
        self.columns.push(mapping);
    }

    /// Declare a column with explicit storage name; wire type inferred.
    pub fn column(
        mut self,
        property: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        self.push(ColumnMapping::new(property, column, value_type));
        self
    }

    /// Declare a column with an explicit wire type override.
    pub fn column_with_wire(
        mut self,
        property: impl Into<String>,
        column: impl Into<String>,
        value_type: ValueType,
        wire_type: WireType,
    ) -> Self {
        self.push(ColumnMapping::with_wire_type(
            property, column, value_type, wire_type,
        ));
        self
    }

    /// Declare a column whose storage name is derived from the property
    /// name by lower-case/underscore conversion.
    pub fn property(self, property: &str, value_type: ValueType) -> Self {
        let column = to_snake_case(property);
        self.column(property.to_string(), column, value_type)
    }

    /// Declare a column whose value type is taken from the property's
    /// Rust type. This is the auto-mapping path used by `map_columns!`.
    pub fn property_of<T: ColumnType>(self, property: &str) -> Self {
        self.property(property, T::value_type())
    }

    /// Freeze the mapping. Fails fast on an empty table name or on the
    /// first deferred declaration error.
    pub fn build(self) -> TesseraResult<TableMapping> {
        if self.table.trim().is_empty() {
            return Err(MappingError::MissingTableName {
                schema: self.schema,
            }
            .into());
        }
        if let Some(error) = self.error {
            return Err(error.into());
        }
        Ok(TableMapping {
            schema: self.schema,
            table: self.table,
            columns: self.columns,
            index: self.index,
        })
    }
}

/// Convert a logical property name to lower-case/underscore form.
/// Already-snake-case names pass through unchanged.
pub(crate) fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_lower = false;
        } else {
            prev_lower = ch.is_alphanumeric();
            out.push(ch);
        }
    }
    out
}

/// Contract a record type implements to participate in mapping.
///
/// `build_mapping` is the registration-time schema descriptor; it runs
/// at most once per type (the registry memoizes the result). The
/// accessor methods expose the base identity every persisted row
/// carries.
pub trait MappedRecord: Send + Sync + 'static {
    /// Declare the table mapping for this type. Called once, at first
    /// access, by the mapping registry.
    fn build_mapping() -> TesseraResult<TableMapping>;

    /// Row identity.
    fn id(&self) -> RecordId;

    /// Tenant/partition code the row belongs to.
    fn tenant_code(&self) -> &str;

    /// The optimistic-concurrency stamp as read from storage.
    fn entity_version(&self) -> RegistryVersion;
}
