//! Optimistic-concurrency repository over the synthesized command text.
//!
//! Version conflicts are an expected outcome, not an error: versioned
//! update/delete return `Ok(false)` when the expected version no longer
//! matches and the row was left untouched. Only transport and decode
//! failures surface as `Err`.
//!
//! The repository never stamps versions itself. Callers advance the
//! record's version through a `VersionSequence` before calling
//! [`Repository::update`], passing the previously read version as the
//! expected one.

use crate::bulk::{BulkSink, BulkWrite, ColumnCollector};
use crate::executor::{Parameters, SqlExecutor};
use crate::row::FromRow;
use std::marker::PhantomData;
use std::sync::Arc;
use tessera_core::{RecordId, RegistryVersion, RepositoryError, TesseraResult};
use tessera_mapping::{
    base, commands_for, ColumnValue, MappedRecord, OrderByClause, Page, TableCommands,
    WhereClause, EXPECTED_VERSION_SUFFIX,
};

/// Typed repository for one mapped record type.
///
/// Cheap to construct: the command set is memoized per type in the
/// mapping registry, so every instance shares the same cached text.
pub struct Repository<R: MappedRecord> {
    executor: Arc<dyn SqlExecutor>,
    commands: Arc<TableCommands>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: MappedRecord> Repository<R> {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> TesseraResult<Self> {
        Ok(Self {
            executor,
            commands: commands_for::<R>()?,
            _marker: PhantomData,
        })
    }

    /// The cached command set backing this repository.
    pub fn commands(&self) -> &TableCommands {
        &self.commands
    }

    /// Parameter list naming every mapped column of one record, in
    /// declaration order, values taken from the record's bulk writer.
    fn record_parameters(&self, record: &R) -> TesseraResult<Parameters>
    where
        R: BulkWrite,
    {
        let mut collector = ColumnCollector::new();
        collector.start_row()?;
        record.write_row(&mut collector)?;
        let row = collector.into_single_row()?;

        let columns = self.commands.mapping().columns();
        if row.len() != columns.len() {
            return Err(RepositoryError::BulkLoad {
                reason: format!(
                    "record wrote {} columns, mapping declares {}",
                    row.len(),
                    columns.len()
                ),
            }
            .into());
        }
        columns
            .iter()
            .zip(row)
            .map(|(column, (value, _))| {
                Ok((self.commands.parameter_name(&column.property)?, value))
            })
            .collect()
    }

    fn identity_parameters(&self, id: RecordId, tenant_code: &str) -> TesseraResult<Parameters> {
        Ok(vec![
            (
                self.commands.parameter_name(base::ID)?,
                ColumnValue::Uuid(id),
            ),
            (
                self.commands.parameter_name(base::TENANT_CODE)?,
                ColumnValue::Text(tenant_code.to_string()),
            ),
        ])
    }

    /// Insert one record. Every mapped column is bound by name.
    pub async fn insert(&self, record: &R) -> TesseraResult<()>
    where
        R: BulkWrite,
    {
        let params = self.record_parameters(record)?;
        let affected = self
            .executor
            .execute(self.commands.insert(), &params)
            .await?;
        if affected != 1 {
            return Err(RepositoryError::Driver {
                reason: format!("INSERT affected {} rows", affected),
            }
            .into());
        }
        Ok(())
    }

    /// Fetch one record by identity within a tenant.
    pub async fn get(&self, id: RecordId, tenant_code: &str) -> TesseraResult<Option<R>>
    where
        R: FromRow,
    {
        let params = self.identity_parameters(id, tenant_code)?;
        let rows = self
            .executor
            .query(self.commands.select_by_id(), &params)
            .await?;
        rows.first().map(R::from_row).transpose()
    }

    /// Query records under the tenant filter, optionally narrowed,
    /// ordered and paginated. Every parameter of the predicate must be
    /// bound before the call.
    pub async fn select(
        &self,
        tenant_code: &str,
        where_clause: Option<&WhereClause>,
        order_by: Option<&OrderByClause>,
        page: Option<Page>,
    ) -> TesseraResult<Vec<R>>
    where
        R: FromRow,
    {
        let sql = self.commands.generate_select(where_clause, order_by, page);
        let mut params = vec![(
            self.commands.parameter_name(base::TENANT_CODE)?,
            ColumnValue::Text(tenant_code.to_string()),
        )];
        if let Some(clause) = where_clause {
            params.extend(clause_parameters(clause)?);
        }
        let rows = self.executor.query(&sql, &params).await?;
        rows.iter().map(R::from_row).collect()
    }

    /// EXISTS probe under the tenant filter, optionally narrowed.
    pub async fn exists(
        &self,
        tenant_code: &str,
        where_clause: Option<&WhereClause>,
    ) -> TesseraResult<bool> {
        let sql = match where_clause {
            Some(clause) => self.commands.generate_exists(clause),
            None => self.commands.exists().to_string(),
        };
        let mut params = vec![(
            self.commands.parameter_name(base::TENANT_CODE)?,
            ColumnValue::Text(tenant_code.to_string()),
        )];
        if let Some(clause) = where_clause {
            params.extend(clause_parameters(clause)?);
        }
        let rows = self.executor.query(&sql, &params).await?;
        match rows.first().and_then(|r| r.columns().first()) {
            Some((_, ColumnValue::Bool(value))) => Ok(*value),
            other => Err(RepositoryError::Driver {
                reason: format!("EXISTS probe returned {:?}", other),
            }
            .into()),
        }
    }

    /// Compare-and-swap update. The record must already carry its NEW
    /// version; `expected` is the version previously read from storage.
    /// Returns `Ok(false)` without touching the row when another writer
    /// got there first.
    pub async fn update(&self, record: &R, expected: RegistryVersion) -> TesseraResult<bool>
    where
        R: BulkWrite,
    {
        let mut params = self.record_parameters(record)?;
        params.push((
            self.commands
                .parameter_name_with_suffix(base::ENTITY_VERSION, EXPECTED_VERSION_SUFFIX)?,
            ColumnValue::Int64(expected.value()),
        ));
        let affected = self
            .executor
            .execute(self.commands.update_versioned(), &params)
            .await?;
        if affected != 1 {
            tracing::debug!(
                table = self.commands.table_name(),
                id = %record.id(),
                expected = expected.value(),
                "version conflict on update"
            );
        }
        Ok(affected == 1)
    }

    /// Delete by identity. With an expected version this is a CAS
    /// delete; without one it deletes unconditionally. Returns whether
    /// a row was removed.
    pub async fn delete(
        &self,
        id: RecordId,
        tenant_code: &str,
        expected: Option<RegistryVersion>,
    ) -> TesseraResult<bool> {
        let mut params = self.identity_parameters(id, tenant_code)?;
        let sql = match expected {
            Some(version) => {
                params.push((
                    self.commands
                        .parameter_name_with_suffix(base::ENTITY_VERSION, EXPECTED_VERSION_SUFFIX)?,
                    ColumnValue::Int64(version.value()),
                ));
                self.commands.delete_versioned()
            }
            None => self.commands.delete(),
        };
        let affected = self.executor.execute(sql, &params).await?;
        if affected != 1 {
            tracing::debug!(
                table = self.commands.table_name(),
                id = %id,
                "delete removed no row"
            );
        }
        Ok(affected == 1)
    }

    /// Stream a batch of records into a bulk sink, one row per record,
    /// columns in the COPY command's declaration order. Yields the row
    /// count reported by the sink.
    pub fn copy_all<'a, I>(&self, sink: &mut dyn BulkSink, records: I) -> TesseraResult<u64>
    where
        R: BulkWrite + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        for record in records {
            sink.start_row()?;
            record.write_row(sink)?;
        }
        sink.complete()
    }
}

/// Extract `(name, value)` pairs from a fully bound predicate. A
/// parameter left unbound is a caller bug, reported loudly.
fn clause_parameters(clause: &WhereClause) -> TesseraResult<Parameters> {
    clause
        .bindings()
        .iter()
        .map(|binding| match &binding.value {
            Some(value) => Ok((binding.name.clone(), value.clone())),
            None => Err(RepositoryError::UnboundParameter {
                name: binding.name.clone(),
            }
            .into()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tessera_core::{new_record_id, TesseraError};
    use tessera_mapping::{map_columns, Operator, TableMapping, WireType};
    use uuid::Uuid;

    struct Gauge {
        id: RecordId,
        tenant_code: String,
        entity_version: RegistryVersion,
        name: String,
        reading: f64,
    }

    impl MappedRecord for Gauge {
        fn build_mapping() -> TesseraResult<TableMapping> {
            let builder = TableMapping::builder(Some("lab"), "gauge");
            map_columns!(builder, {
                name: String,
                reading: f64,
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

    impl BulkWrite for Gauge {
        fn write_row(&self, sink: &mut dyn BulkSink) -> TesseraResult<()> {
            sink.write_column(&ColumnValue::Uuid(self.id), WireType::Uuid)?;
            sink.write_column(
                &ColumnValue::Text(self.tenant_code.clone()),
                WireType::Text,
            )?;
            // Audit columns, unset in this fixture.
            for _ in 0..10 {
                sink.write_column(&ColumnValue::Null, WireType::Text)?;
            }
            sink.write_column(
                &ColumnValue::Int64(self.entity_version.value()),
                WireType::Int8,
            )?;
            sink.write_column(&ColumnValue::Text(self.name.clone()), WireType::Text)?;
            sink.write_column(&ColumnValue::Float64(self.reading), WireType::Float8)?;
            Ok(())
        }
    }

    impl FromRow for Gauge {
        fn from_row(row: &Row) -> TesseraResult<Self> {
            Ok(Self {
                id: row.get_uuid(base::ID)?,
                tenant_code: row.get_text(base::TENANT_CODE)?,
                entity_version: row.get_version(base::ENTITY_VERSION)?,
                name: row.get_text("name")?,
                reading: row.get_f64("reading")?,
            })
        }
    }

    fn gauge() -> Gauge {
        Gauge {
            id: new_record_id(),
            tenant_code: "acme".to_string(),
            entity_version: RegistryVersion::from_existing(41),
            name: "boiler".to_string(),
            reading: 98.6,
        }
    }

    /// Scripted executor: records every statement it sees and replays
    /// preloaded responses in order.
    #[derive(Default)]
    struct StubExecutor {
        calls: Mutex<Vec<(String, Parameters)>>,
        execute_results: Mutex<Vec<u64>>,
        query_results: Mutex<Vec<Vec<Row>>>,
    }

    impl StubExecutor {
        fn with_execute(results: Vec<u64>) -> Self {
            Self {
                execute_results: Mutex::new(results),
                ..Self::default()
            }
        }

        fn with_query(results: Vec<Vec<Row>>) -> Self {
            Self {
                query_results: Mutex::new(results),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, Parameters)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SqlExecutor for StubExecutor {
        async fn execute(&self, sql: &str, params: &Parameters) -> TesseraResult<u64> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.clone()));
            Ok(self.execute_results.lock().unwrap().remove(0))
        }

        async fn query(&self, sql: &str, params: &Parameters) -> TesseraResult<Vec<Row>> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.clone()));
            Ok(self.query_results.lock().unwrap().remove(0))
        }
    }

    fn repo(executor: Arc<StubExecutor>) -> Repository<Gauge> {
        Repository::new(executor).unwrap()
    }

    #[tokio::test]
    async fn test_insert_binds_every_column_by_name() {
        let executor = Arc::new(StubExecutor::with_execute(vec![1]));
        let repo = repo(executor.clone());
        let record = gauge();
        repo.insert(&record).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        let (sql, params) = &calls[0];
        assert_eq!(sql, repo.commands().insert());
        assert_eq!(params.len(), repo.commands().mapping().len());
        assert_eq!(params[0].0, "@lab_gauge_id");
        assert_eq!(params[0].1, ColumnValue::Uuid(record.id));
        assert_eq!(
            params.last().unwrap(),
            &(
                "@lab_gauge_reading".to_string(),
                ColumnValue::Float64(98.6)
            )
        );
    }

    #[tokio::test]
    async fn test_insert_with_zero_affected_is_an_error() {
        let executor = Arc::new(StubExecutor::with_execute(vec![0]));
        let result = repo(executor).insert(&gauge()).await;
        assert!(matches!(
            result,
            Err(TesseraError::Repository(RepositoryError::Driver { .. }))
        ));
    }

    #[tokio::test]
    async fn test_get_rehydrates_or_returns_none() {
        let record = gauge();
        let mut row = Row::new();
        row.push(base::ID, ColumnValue::Uuid(record.id));
        row.push(base::TENANT_CODE, ColumnValue::Text("acme".to_string()));
        row.push(base::ENTITY_VERSION, ColumnValue::Int64(41));
        row.push("name", ColumnValue::Text("boiler".to_string()));
        row.push("reading", ColumnValue::Float64(98.6));

        let executor = Arc::new(StubExecutor::with_query(vec![vec![row], vec![]]));
        let repo = repo(executor.clone());

        let found = repo.get(record.id, "acme").await.unwrap().unwrap();
        assert_eq!(found.name, "boiler");
        assert_eq!(found.entity_version, RegistryVersion::from_existing(41));

        let missing = repo.get(Uuid::nil(), "acme").await.unwrap();
        assert!(missing.is_none());

        let (sql, params) = &executor.calls()[0];
        assert_eq!(sql, repo.commands().select_by_id());
        assert_eq!(params[1].1, ColumnValue::Text("acme".to_string()));
    }

    #[tokio::test]
    async fn test_select_sends_tenant_then_clause_parameters() {
        let executor = Arc::new(StubExecutor::with_query(vec![vec![]]));
        let repo = repo(executor.clone());
        let clause = repo
            .commands()
            .where_("name", Operator::Equal)
            .unwrap()
            .bind(ColumnValue::Text("boiler".to_string()));
        let order = repo.commands().order_by_descending("reading").unwrap();

        let rows = repo
            .select("acme", Some(&clause), Some(&order), Some(Page::new(2, 10)))
            .await
            .unwrap();
        assert!(rows.is_empty());

        let (sql, params) = &executor.calls()[0];
        assert!(sql.contains("AND (lab.gauge.name = @lab_gauge_name)"));
        assert!(sql.ends_with("ORDER BY lab.gauge.reading DESC LIMIT 10 OFFSET 10"));
        assert_eq!(params[0].0, "@lab_gauge_tenant_code");
        assert_eq!(params[1].0, "@lab_gauge_name");
    }

    #[tokio::test]
    async fn test_select_rejects_unbound_clause_parameter() {
        let executor = Arc::new(StubExecutor::default());
        let repo = repo(executor);
        let unbound = repo.commands().where_eq("name").unwrap();
        let result = repo.select("acme", Some(&unbound), None, None).await;
        assert!(matches!(
            result,
            Err(TesseraError::Repository(
                RepositoryError::UnboundParameter { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_exists_decodes_boolean_probe() {
        let mut row = Row::new();
        row.push("exists", ColumnValue::Bool(true));
        let executor = Arc::new(StubExecutor::with_query(vec![vec![row]]));
        let repo = repo(executor.clone());
        assert!(repo.exists("acme", None).await.unwrap());
        assert_eq!(executor.calls()[0].0, repo.commands().exists());
    }

    #[tokio::test]
    async fn test_update_reports_conflict_as_false() {
        let executor = Arc::new(StubExecutor::with_execute(vec![1, 0]));
        let repo = repo(executor.clone());
        let record = gauge();
        let expected = RegistryVersion::from_existing(40);

        assert!(repo.update(&record, expected).await.unwrap());
        assert!(!repo.update(&record, expected).await.unwrap());

        let (sql, params) = &executor.calls()[0];
        assert_eq!(sql, repo.commands().update_versioned());
        assert_eq!(
            params.last().unwrap(),
            &(
                "@lab_gauge_entity_version_expected".to_string(),
                ColumnValue::Int64(40)
            )
        );
        // The SET side carries the record's own (new) version.
        assert!(params.contains(&(
            "@lab_gauge_entity_version".to_string(),
            ColumnValue::Int64(41)
        )));
    }

    #[tokio::test]
    async fn test_delete_picks_versioned_statement_when_expected_given() {
        let executor = Arc::new(StubExecutor::with_execute(vec![1, 0]));
        let repo = repo(executor.clone());
        let id = new_record_id();

        assert!(repo.delete(id, "acme", None).await.unwrap());
        assert!(!repo
            .delete(id, "acme", Some(RegistryVersion::from_existing(40)))
            .await
            .unwrap());

        let calls = executor.calls();
        assert_eq!(calls[0].0, repo.commands().delete());
        assert_eq!(calls[1].0, repo.commands().delete_versioned());
        assert_eq!(
            calls[1].1.last().unwrap().0,
            "@lab_gauge_entity_version_expected"
        );
    }

    #[test]
    fn test_copy_all_emits_columns_in_copy_order() {
        let executor = Arc::new(StubExecutor::default());
        let repo = repo(executor);
        let records = vec![gauge(), gauge()];
        let mut sink = ColumnCollector::new();

        let written = repo.copy_all(&mut sink, &records).unwrap();
        assert_eq!(written, 2);
        let columns = repo.commands().mapping().columns();
        for row in sink.rows() {
            assert_eq!(row.len(), columns.len());
            for (written, declared) in row.iter().zip(columns) {
                if written.0 != ColumnValue::Null {
                    assert_eq!(written.1, declared.wire_type);
                }
            }
        }
    }
}
