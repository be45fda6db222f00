//! TESSERA Repo - Repository Protocol and Driver Boundary
//!
//! Defines the seam to the wire-protocol driver (parameterized statement
//! execution and binary bulk loading) and the optimistic-concurrency
//! repository protocol built on top of the synthesized command text.
//! The driver itself lives outside this workspace; everything here is
//! specified at its boundary.

pub mod bulk;
pub mod executor;
pub mod repository;
pub mod row;

pub use bulk::{BulkSink, BulkWrite, ColumnCollector};
pub use executor::{Parameters, SqlExecutor};
pub use repository::Repository;
pub use row::{FromRow, Row};
