//! Binary bulk-load writer contract.
//!
//! Records stream themselves column by column into a [`BulkSink`]; the
//! order MUST match the column list of the mapping's COPY command
//! exactly, since the binary wire format carries no column names. The
//! sink implementation (driver-side) owns framing and byte encoding;
//! this layer only fixes the order and the wire type of each value.

use tessera_core::{RepositoryError, TesseraResult};
use tessera_mapping::{ColumnValue, WireType};

/// Receiving end of a binary bulk load.
pub trait BulkSink {
    /// Begin a new row.
    fn start_row(&mut self) -> TesseraResult<()>;

    /// Append the next column of the current row.
    fn write_column(&mut self, value: &ColumnValue, wire: WireType) -> TesseraResult<()>;

    /// Finish the stream; yields the number of complete rows written.
    fn complete(&mut self) -> TesseraResult<u64>;
}

/// Record-side half of the contract: emit every mapped column, in the
/// mapping's declaration order, via `write_column`.
pub trait BulkWrite {
    fn write_row(&self, sink: &mut dyn BulkSink) -> TesseraResult<()>;
}

/// In-memory [`BulkSink`] that just collects what was written.
///
/// Doubles as the bridge from `BulkWrite` to named-parameter binding:
/// the repository writes one row into a collector and zips the values
/// with the mapping's column list.
#[derive(Debug, Default)]
pub struct ColumnCollector {
    completed: Vec<Vec<(ColumnValue, WireType)>>,
    current: Vec<(ColumnValue, WireType)>,
    in_row: bool,
}

impl ColumnCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_current(&mut self) {
        if self.in_row {
            self.completed.push(std::mem::take(&mut self.current));
            self.in_row = false;
        }
    }

    /// All completed rows, in write order.
    pub fn rows(&self) -> &[Vec<(ColumnValue, WireType)>] {
        &self.completed
    }

    /// Consume the collector expecting exactly one row.
    pub fn into_single_row(mut self) -> TesseraResult<Vec<(ColumnValue, WireType)>> {
        self.flush_current();
        if self.completed.len() != 1 {
            return Err(RepositoryError::BulkLoad {
                reason: format!("expected exactly one row, got {}", self.completed.len()),
            }
            .into());
        }
        Ok(self.completed.remove(0))
    }
}

impl BulkSink for ColumnCollector {
    fn start_row(&mut self) -> TesseraResult<()> {
        self.flush_current();
        self.in_row = true;
        Ok(())
    }

    fn write_column(&mut self, value: &ColumnValue, wire: WireType) -> TesseraResult<()> {
        if !self.in_row {
            return Err(RepositoryError::BulkLoad {
                reason: "write_column before start_row".to_string(),
            }
            .into());
        }
        self.current.push((value.clone(), wire));
        Ok(())
    }

    fn complete(&mut self) -> TesseraResult<u64> {
        self.flush_current();
        Ok(self.completed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_groups_columns_into_rows() {
        let mut sink = ColumnCollector::new();
        sink.start_row().unwrap();
        sink.write_column(&ColumnValue::Int64(1), WireType::Int8)
            .unwrap();
        sink.write_column(&ColumnValue::Text("a".to_string()), WireType::Text)
            .unwrap();
        sink.start_row().unwrap();
        sink.write_column(&ColumnValue::Int64(2), WireType::Int8)
            .unwrap();
        sink.write_column(&ColumnValue::Null, WireType::Text)
            .unwrap();
        assert_eq!(sink.complete().unwrap(), 2);
        assert_eq!(sink.rows()[0].len(), 2);
        assert_eq!(sink.rows()[1][1], (ColumnValue::Null, WireType::Text));
    }

    #[test]
    fn test_write_column_outside_a_row_is_rejected() {
        let mut sink = ColumnCollector::new();
        assert!(sink
            .write_column(&ColumnValue::Int64(1), WireType::Int8)
            .is_err());
    }

    #[test]
    fn test_into_single_row_requires_exactly_one() {
        let mut sink = ColumnCollector::new();
        sink.start_row().unwrap();
        sink.write_column(&ColumnValue::Bool(true), WireType::Bool)
            .unwrap();
        let row = sink.into_single_row().unwrap();
        assert_eq!(row, vec![(ColumnValue::Bool(true), WireType::Bool)]);

        let empty = ColumnCollector::new();
        assert!(empty.into_single_row().is_err());

        let mut two = ColumnCollector::new();
        two.start_row().unwrap();
        two.start_row().unwrap();
        two.complete().unwrap();
        assert!(two.into_single_row().is_err());
    }

    #[test]
    fn test_complete_is_idempotent_over_count() {
        let mut sink = ColumnCollector::new();
        sink.start_row().unwrap();
        assert_eq!(sink.complete().unwrap(), 1);
        assert_eq!(sink.complete().unwrap(), 1);
    }
}
