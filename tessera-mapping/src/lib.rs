//! TESSERA Mapping - Relational Mapping and SQL Synthesis
//!
//! Turns a plain record type into a frozen relational table contract:
//! an ordered column list with value/wire type tags, cached
//! SELECT/INSERT/UPDATE/DELETE/EXISTS/COPY command text, and composable
//! predicate/ordering fragments with deterministic parameter names.
//!
//! A record type registers its mapping once (via [`MappedRecord`] and
//! the [`map_columns!`] helper); thereafter the mapping and all derived
//! command text are read-only and shared process-wide.

pub mod clause;
pub mod column;
pub mod commands;
pub mod macros;
pub mod registry;
pub mod types;

pub use clause::{Binding, Operator, OrderByClause, SortDirection, WhereClause};
pub use column::{base, ColumnMapping, MappedRecord, TableMapping, TableMappingBuilder};
pub use commands::{Page, TableCommands, EXPECTED_VERSION_SUFFIX};
pub use registry::commands_for;
pub use types::{ColumnType, ColumnValue, ValueType, WireType};
