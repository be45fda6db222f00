//! Async driver boundary for parameterized statement execution.
//!
//! The engine never talks to the network itself; it hands finished SQL
//! text and named parameter values to an implementation of this trait.
//! Cancellation and timeouts belong to the driver - the mapping and
//! synthesis layers are pure CPU work and never suspend.

use crate::row::Row;
use async_trait::async_trait;
use tessera_mapping::ColumnValue;
use tessera_core::TesseraResult;

/// Named parameter values accompanying one statement. Names carry the
/// `@` prefix exactly as they appear in the command text.
pub type Parameters = Vec<(String, ColumnValue)>;

/// Parameterized-statement executor provided by the driver.
///
/// Driver failures propagate unchanged as
/// [`tessera_core::RepositoryError::Driver`]; this layer never retries.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement that returns no rows; yields the affected
    /// row count. The optimistic-concurrency protocol rests entirely on
    /// this count being exact.
    async fn execute(&self, sql: &str, params: &Parameters) -> TesseraResult<u64>;

    /// Execute a statement that returns rows.
    async fn query(&self, sql: &str, params: &Parameters) -> TesseraResult<Vec<Row>>;
}
