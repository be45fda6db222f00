//! TESSERA Test Utilities
//!
//! Centralized test infrastructure for the TESSERA workspace:
//! - Deterministic clocks for version-sequence tests
//! - An in-memory SqlExecutor that honors the synthesized command text
//! - Fixture record types with full mappings
//! - Proptest generators for mapping and version types

// Re-export the pieces fixtures are built from, for convenience
pub use tessera_core::{
    new_record_id, AuditStamp, Clock, RecordAudit, RecordId, RegistryVersion, SystemClock,
    TesseraResult, Timestamp, VersionSequence,
};
pub use tessera_mapping::{
    base, commands_for, ColumnValue, MappedRecord, TableCommands, TableMapping, WireType,
};
pub use tessera_repo::{BulkSink, BulkWrite, FromRow, Parameters, Repository, Row, SqlExecutor};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tessera_core::RepositoryError;
use tessera_mapping::map_columns;
use uuid::Uuid;

// ============================================================================
// DETERMINISTIC CLOCKS
// ============================================================================

/// Clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Clock that advances by a fixed number of microseconds per reading.
#[derive(Debug)]
pub struct SteppingClock {
    start: Timestamp,
    step_micros: i64,
    reads: AtomicI64,
}

impl SteppingClock {
    pub fn new(start: Timestamp, step_micros: i64) -> Self {
        Self {
            start,
            step_micros,
            reads: AtomicI64::new(0),
        }
    }

    /// Clock starting at an arbitrary fixed epoch, one microsecond per
    /// reading.
    pub fn from_origin() -> Self {
        Self::new(Utc::now(), 1)
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::microseconds(n * self.step_micros)
    }
}

// ============================================================================
// IN-MEMORY EXECUTOR
// ============================================================================

/// In-memory [`SqlExecutor`] that honors the cached command text of one
/// table's command set.
///
/// It recognizes statements by comparing against the synthesized text
/// (INSERT, SELECT-by-id, base SELECT, versioned UPDATE/DELETE, EXISTS)
/// and applies the matching semantics to a map of stored rows, so
/// end-to-end repository flows run without a database. The versioned
/// statements implement true compare-and-swap: a version mismatch
/// leaves the row untouched and reports zero affected rows.
pub struct MemoryExecutor {
    commands: Arc<TableCommands>,
    rows: Mutex<BTreeMap<RecordId, Vec<(String, ColumnValue)>>>,
}

impl MemoryExecutor {
    pub fn for_table(commands: Arc<TableCommands>) -> Self {
        Self {
            commands,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn for_record<R: MappedRecord>() -> TesseraResult<Self> {
        Ok(Self::for_table(commands_for::<R>()?))
    }

    /// Number of stored rows across all tenants.
    pub fn row_count(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn param_map(params: &Parameters) -> HashMap<&str, &ColumnValue> {
        params.iter().map(|(n, v)| (n.as_str(), v)).collect()
    }

    fn required<'a>(
        map: &HashMap<&str, &'a ColumnValue>,
        name: &str,
    ) -> TesseraResult<&'a ColumnValue> {
        map.get(name).copied().ok_or_else(|| {
            RepositoryError::UnboundParameter {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Assemble a stored row (property, value) in declaration order from
    /// named parameters.
    fn row_from_params(&self, params: &Parameters) -> TesseraResult<Vec<(String, ColumnValue)>> {
        let map = Self::param_map(params);
        self.commands
            .mapping()
            .columns()
            .iter()
            .map(|column| {
                let name = self.commands.parameter_name(&column.property)?;
                let value = Self::required(&map, &name)?;
                Ok((column.property.clone(), value.clone()))
            })
            .collect()
    }

    fn identity_from_params(&self, params: &Parameters) -> TesseraResult<(RecordId, String)> {
        let map = Self::param_map(params);
        let id = match Self::required(&map, &self.commands.parameter_name(base::ID)?)? {
            ColumnValue::Uuid(id) => *id,
            other => {
                return Err(RepositoryError::Driver {
                    reason: format!("id parameter is not a uuid: {:?}", other),
                }
                .into())
            }
        };
        let tenant = match Self::required(&map, &self.commands.parameter_name(base::TENANT_CODE)?)?
        {
            ColumnValue::Text(t) => t.clone(),
            other => {
                return Err(RepositoryError::Driver {
                    reason: format!("tenant parameter is not text: {:?}", other),
                }
                .into())
            }
        };
        Ok((id, tenant))
    }

    fn expected_version(&self, params: &Parameters) -> TesseraResult<i64> {
        let map = Self::param_map(params);
        let name = self.commands.parameter_name_with_suffix(
            base::ENTITY_VERSION,
            tessera_mapping::EXPECTED_VERSION_SUFFIX,
        )?;
        match Self::required(&map, &name)? {
            ColumnValue::Int64(v) => Ok(*v),
            other => Err(RepositoryError::Driver {
                reason: format!("expected-version parameter is not int64: {:?}", other),
            }
            .into()),
        }
    }

    fn row_field<'a>(row: &'a [(String, ColumnValue)], property: &str) -> Option<&'a ColumnValue> {
        row.iter().find(|(p, _)| p == property).map(|(_, v)| v)
    }

    fn row_matches_identity(row: &[(String, ColumnValue)], tenant: &str) -> bool {
        matches!(
            Self::row_field(row, base::TENANT_CODE),
            Some(ColumnValue::Text(t)) if t == tenant
        )
    }

    fn stored_version(row: &[(String, ColumnValue)]) -> Option<i64> {
        match Self::row_field(row, base::ENTITY_VERSION) {
            Some(ColumnValue::Int64(v)) => Some(*v),
            _ => None,
        }
    }

    fn unrecognized(sql: &str) -> tessera_core::TesseraError {
        RepositoryError::Driver {
            reason: format!("statement not recognized by MemoryExecutor: {}", sql),
        }
        .into()
    }
}

#[async_trait]
impl SqlExecutor for MemoryExecutor {
    async fn execute(&self, sql: &str, params: &Parameters) -> TesseraResult<u64> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);

        if sql == self.commands.insert() {
            let row = self.row_from_params(params)?;
            let id = match Self::row_field(&row, base::ID) {
                Some(ColumnValue::Uuid(id)) => *id,
                _ => {
                    return Err(RepositoryError::Driver {
                        reason: "insert without uuid id".to_string(),
                    }
                    .into())
                }
            };
            if rows.contains_key(&id) {
                return Err(RepositoryError::Driver {
                    reason: format!("duplicate key value: {}", id),
                }
                .into());
            }
            rows.insert(id, row);
            return Ok(1);
        }

        if sql == self.commands.update_versioned() {
            let row = self.row_from_params(params)?;
            let (id, tenant) = self.identity_from_params(params)?;
            let expected = self.expected_version(params)?;
            return Ok(match rows.get_mut(&id) {
                Some(stored)
                    if Self::row_matches_identity(stored, &tenant)
                        && Self::stored_version(stored) == Some(expected) =>
                {
                    *stored = row;
                    1
                }
                _ => 0,
            });
        }

        if sql == self.commands.delete() || sql == self.commands.delete_versioned() {
            let (id, tenant) = self.identity_from_params(params)?;
            let versioned = sql == self.commands.delete_versioned();
            let matches = match rows.get(&id) {
                Some(stored) if Self::row_matches_identity(stored, &tenant) => {
                    if versioned {
                        Self::stored_version(stored) == Some(self.expected_version(params)?)
                    } else {
                        true
                    }
                }
                _ => false,
            };
            if matches {
                rows.remove(&id);
                return Ok(1);
            }
            return Ok(0);
        }

        Err(Self::unrecognized(sql))
    }

    async fn query(&self, sql: &str, params: &Parameters) -> TesseraResult<Vec<Row>> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);

        if sql == self.commands.select_by_id() {
            let (id, tenant) = self.identity_from_params(params)?;
            return Ok(rows
                .get(&id)
                .filter(|stored| Self::row_matches_identity(stored, &tenant))
                .map(|stored| Row::from_pairs(stored.clone()))
                .into_iter()
                .collect());
        }

        if sql == self.commands.select() {
            let map = Self::param_map(params);
            let tenant =
                match Self::required(&map, &self.commands.parameter_name(base::TENANT_CODE)?)? {
                    ColumnValue::Text(t) => t.clone(),
                    _ => {
                        return Err(RepositoryError::Driver {
                            reason: "tenant parameter is not text".to_string(),
                        }
                        .into())
                    }
                };
            return Ok(rows
                .values()
                .filter(|stored| Self::row_matches_identity(stored, &tenant))
                .map(|stored| Row::from_pairs(stored.clone()))
                .collect());
        }

        if sql == self.commands.exists() {
            let map = Self::param_map(params);
            let tenant =
                match Self::required(&map, &self.commands.parameter_name(base::TENANT_CODE)?)? {
                    ColumnValue::Text(t) => t.clone(),
                    _ => {
                        return Err(RepositoryError::Driver {
                            reason: "tenant parameter is not text".to_string(),
                        }
                        .into())
                    }
                };
            let any = rows
                .values()
                .any(|stored| Self::row_matches_identity(stored, &tenant));
            let mut row = Row::new();
            row.push("exists", ColumnValue::Bool(any));
            return Ok(vec![row]);
        }

        Err(Self::unrecognized(sql))
    }
}

// ============================================================================
// FIXTURE RECORDS
// ============================================================================

/// Fully mapped fixture record: `reg.asset` with two business columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub id: RecordId,
    pub tenant_code: String,
    pub audit: RecordAudit,
    pub entity_version: RegistryVersion,
    pub name: String,
    pub serial_number: Option<String>,
}

impl AssetRecord {
    /// Fresh record with a creation audit stamp and a version drawn from
    /// the given sequence.
    pub fn new(
        tenant_code: impl Into<String>,
        name: impl Into<String>,
        sequence: &mut VersionSequence,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            id: new_record_id(),
            tenant_code: tenant_code.into(),
            audit: RecordAudit::created_by("fixture", now),
            entity_version: sequence.next(clock),
            name: name.into(),
            serial_number: None,
        }
    }
}

fn stamp_columns(stamp: Option<&AuditStamp>) -> [ColumnValue; 5] {
    match stamp {
        Some(stamp) => [
            ColumnValue::Text(stamp.by.clone()),
            ColumnValue::TimestampTz(stamp.at),
            stamp
                .origin
                .clone()
                .map(ColumnValue::Text)
                .unwrap_or(ColumnValue::Null),
            stamp
                .correlation
                .map(ColumnValue::Uuid)
                .unwrap_or(ColumnValue::Null),
            stamp
                .operation
                .clone()
                .map(ColumnValue::Text)
                .unwrap_or(ColumnValue::Null),
        ],
        None => [
            ColumnValue::Null,
            ColumnValue::Null,
            ColumnValue::Null,
            ColumnValue::Null,
            ColumnValue::Null,
        ],
    }
}

fn stamp_from_row(row: &Row, by: &str, at: &str, origin: &str, correlation: &str, operation: &str)
    -> TesseraResult<Option<AuditStamp>>
{
    let (by, at) = match (row.opt_text(by)?, row.opt_timestamp(at)?) {
        (Some(by), Some(at)) => (by, at),
        _ => return Ok(None),
    };
    Ok(Some(AuditStamp {
        by,
        at,
        origin: row.opt_text(origin)?,
        correlation: row.opt_uuid(correlation)?,
        operation: row.opt_text(operation)?,
    }))
}

impl MappedRecord for AssetRecord {
    fn build_mapping() -> TesseraResult<TableMapping> {
        let builder = TableMapping::builder(Some("reg"), "asset");
        map_columns!(builder, {
            name: String,
            serialNumber: Option<String>,
        })
        .build()
    }

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_code(&self) -> &str {
        &self.tenant_code
    }

    fn entity_version(&self) -> RegistryVersion {
        self.entity_version
    }
}

impl BulkWrite for AssetRecord {
    fn write_row(&self, sink: &mut dyn BulkSink) -> TesseraResult<()> {
        sink.write_column(&ColumnValue::Uuid(self.id), WireType::Uuid)?;
        sink.write_column(
            &ColumnValue::Text(self.tenant_code.clone()),
            WireType::Text,
        )?;
        for stamp in [self.audit.created.as_ref(), self.audit.changed.as_ref()] {
            let [by, at, origin, correlation, operation] = stamp_columns(stamp);
            sink.write_column(&by, WireType::Text)?;
            sink.write_column(&at, WireType::TimestampTz)?;
            sink.write_column(&origin, WireType::Text)?;
            sink.write_column(&correlation, WireType::Uuid)?;
            sink.write_column(&operation, WireType::Text)?;
        }
        sink.write_column(
            &ColumnValue::Int64(self.entity_version.value()),
            WireType::Int8,
        )?;
        sink.write_column(&ColumnValue::Text(self.name.clone()), WireType::Text)?;
        sink.write_column(
            &self
                .serial_number
                .clone()
                .map(ColumnValue::Text)
                .unwrap_or(ColumnValue::Null),
            WireType::Text,
        )?;
        Ok(())
    }
}

impl FromRow for AssetRecord {
    fn from_row(row: &Row) -> TesseraResult<Self> {
        Ok(Self {
            id: row.get_uuid(base::ID)?,
            tenant_code: row.get_text(base::TENANT_CODE)?,
            audit: RecordAudit {
                created: stamp_from_row(
                    row,
                    base::CREATED_BY,
                    base::CREATED_AT,
                    base::CREATED_ORIGIN,
                    base::CREATED_CORRELATION,
                    base::CREATED_OPERATION,
                )?,
                changed: stamp_from_row(
                    row,
                    base::CHANGED_BY,
                    base::CHANGED_AT,
                    base::CHANGED_ORIGIN,
                    base::CHANGED_CORRELATION,
                    base::CHANGED_OPERATION,
                )?,
            },
            entity_version: row.get_version(base::ENTITY_VERSION)?,
            name: row.get_text("name")?,
            serial_number: row.opt_text("serialNumber")?,
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for TESSERA mapping and version types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a tenant code (short lower-case identifier).
    pub fn arb_tenant_code() -> impl Strategy<Value = String> {
        "[a-z]{3,10}"
    }

    /// Generate a logical property name in lowerCamelCase.
    pub fn arb_property_name() -> impl Strategy<Value = String> {
        "[a-z]{2,8}([A-Z][a-z]{1,6}){0,2}"
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a RegistryVersion over the plausible tick range.
    pub fn arb_version() -> impl Strategy<Value = RegistryVersion> {
        (1i64..i64::MAX / 2).prop_map(RegistryVersion::from_existing)
    }

    /// Generate an AssetRecord with a fixed version.
    pub fn arb_asset(tenant_code: String) -> impl Strategy<Value = AssetRecord> {
        (
            arb_uuid(),
            "[a-zA-Z0-9 ]{1,40}",
            prop::option::of("[A-Z0-9-]{4,20}"),
            arb_version(),
            arb_timestamp(),
        )
            .prop_map(move |(id, name, serial_number, version, at)| AssetRecord {
                id,
                tenant_code: tenant_code.clone(),
                audit: RecordAudit::created_by("generator", at),
                entity_version: version,
                name,
                serial_number,
            })
    }
}

// ============================================================================
// TESTS
// ============================================================================
