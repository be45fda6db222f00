//! SQL command synthesis.
//!
//! [`TableCommands`] consumes a [`TableMapping`] once and derives the
//! cached SELECT/INSERT/UPDATE/DELETE/EXISTS/COPY command templates,
//! plus composition functions that append predicate/ordering/pagination
//! fragments on demand.
//!
//! Column references in generated text are table-qualified
//! (`schema.table.column`) wherever SQL permits it, so fragments stay
//! unambiguous when composed across calls. The one exception is the SET
//! list of UPDATE, where SQL requires bare column names. Parameter names
//! derive deterministically from schema+table+property
//! (`@schema_table_property`), so the same logical filter always yields
//! the same parameter name.

use crate::clause::{Operator, OrderByClause, SortDirection, WhereClause};
use crate::column::{base, TableMapping};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tessera_core::TesseraResult;

/// Suffix appended to the expected-version parameter, so the UPDATE can
/// carry both the new version (in SET) and the expected one (in WHERE)
/// over the same column without a parameter collision.
pub const EXPECTED_VERSION_SUFFIX: &str = "_expected";

/// 1-indexed pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Page number, starting at 1.
    pub number: u32,
    /// Rows per page.
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    /// Rows skipped before this page: `(number - 1) * size`.
    pub fn offset(self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }
}

/// Cached command text and clause factory for one table mapping.
///
/// Built once per record type by the registry; immutable afterwards
/// except for the internal clause cache, which only ever fills in.
#[derive(Debug)]
pub struct TableCommands {
    mapping: TableMapping,
    qualified: String,
    prefix: String,
    tenant_filter: String,
    select: String,
    select_by_id: String,
    insert: String,
    update: String,
    update_versioned: String,
    delete: String,
    delete_versioned: String,
    exists: String,
    copy: String,
    clause_cache: RwLock<HashMap<(String, Operator), WhereClause>>,
}

impl TableCommands {
    /// Derive and cache all command templates from a frozen mapping.
    pub fn new(mapping: TableMapping) -> Self {
        let qualified = mapping.qualified_table();
        let prefix = match mapping.schema() {
            Some(schema) => format!("{}_{}", schema, mapping.table()),
            None => mapping.table().to_string(),
        };
        let param = |property: &str| format!("@{}_{}", prefix, property);

        let tenant_filter = format!(
            "{q}.{c} = {p}",
            q = qualified,
            c = base::TENANT_CODE,
            p = param(base::TENANT_CODE)
        );
        let id_filter = format!(
            "{q}.{c} = {p}",
            q = qualified,
            c = base::ID,
            p = param(base::ID)
        );
        let expected_version_filter = format!(
            "{q}.{c} = {p}{s}",
            q = qualified,
            c = base::ENTITY_VERSION,
            p = param(base::ENTITY_VERSION),
            s = EXPECTED_VERSION_SUFFIX
        );

        let select_list: Vec<String> = mapping
            .columns()
            .iter()
            .map(|c| format!("{}.{} AS {}", qualified, c.column, c.property))
            .collect();
        let select = format!(
            "SELECT {} FROM {} WHERE {}",
            select_list.join(", "),
            qualified,
            tenant_filter
        );
        let select_by_id = format!("{} AND {}", select, id_filter);

        let column_list: Vec<&str> = mapping
            .columns()
            .iter()
            .map(|c| c.column.as_str())
            .collect();
        let placeholder_list: Vec<String> = mapping
            .columns()
            .iter()
            .map(|c| param(&c.property))
            .collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualified,
            column_list.join(", "),
            placeholder_list.join(", ")
        );

        // SET over all non-identity columns; tenant_code is the partition
        // key and never reassigned. SQL requires bare column names here.
        let set_list: Vec<String> = mapping
            .columns()
            .iter()
            .filter(|c| c.property != base::ID && c.property != base::TENANT_CODE)
            .map(|c| format!("{} = {}", c.column, param(&c.property)))
            .collect();
        let update = format!(
            "UPDATE {} SET {} WHERE {} AND {}",
            qualified,
            set_list.join(", "),
            id_filter,
            tenant_filter
        );
        let update_versioned = format!("{} AND {}", update, expected_version_filter);

        let delete = format!(
            "DELETE FROM {} WHERE {} AND {}",
            qualified, id_filter, tenant_filter
        );
        let delete_versioned = format!("{} AND {}", delete, expected_version_filter);

        let exists = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {})",
            qualified, tenant_filter
        );

        let copy = format!(
            "COPY {} ({}) FROM STDIN (FORMAT BINARY)",
            qualified,
            column_list.join(", ")
        );

        Self {
            mapping,
            qualified,
            prefix,
            tenant_filter,
            select,
            select_by_id,
            insert,
            update,
            update_versioned,
            delete,
            delete_versioned,
            exists,
            copy,
            clause_cache: RwLock::new(HashMap::new()),
        }
    }

    /// The mapping these commands were derived from.
    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    /// `"schema.table"` or `"table"`.
    pub fn table_name(&self) -> &str {
        &self.qualified
    }

    // === Cached command templates ===

    /// Base SELECT: qualified, aliased column list, tenant filter.
    pub fn select(&self) -> &str {
        &self.select
    }

    /// Base SELECT restricted to one identity.
    pub fn select_by_id(&self) -> &str {
        &self.select_by_id
    }

    /// INSERT over all columns in declaration order.
    pub fn insert(&self) -> &str {
        &self.insert
    }

    /// UPDATE with base WHERE by identity and tenant.
    pub fn update(&self) -> &str {
        &self.update
    }

    /// UPDATE whose WHERE additionally requires the expected version -
    /// the optimistic-concurrency compare-and-swap statement.
    pub fn update_versioned(&self) -> &str {
        &self.update_versioned
    }

    /// DELETE with base WHERE by identity and tenant.
    pub fn delete(&self) -> &str {
        &self.delete
    }

    /// DELETE that additionally requires the expected version.
    pub fn delete_versioned(&self) -> &str {
        &self.delete_versioned
    }

    /// EXISTS probe under the tenant filter.
    pub fn exists(&self) -> &str {
        &self.exists
    }

    /// COPY command naming every column in declaration order. The bulk
    /// columnar writer MUST emit values in exactly this order.
    pub fn copy(&self) -> &str {
        &self.copy
    }

    // === Parameter naming ===

    /// Deterministic parameter name for a mapped property:
    /// `@schema_table_property` (schema omitted when none).
    pub fn parameter_name(&self, property: &str) -> TesseraResult<String> {
        self.mapping.column_for(property)?;
        Ok(format!("@{}_{}", self.prefix, property))
    }

    /// Parameter name with a disambiguating suffix, for two parameters
    /// over the same column in one statement.
    pub fn parameter_name_with_suffix(
        &self,
        property: &str,
        suffix: &str,
    ) -> TesseraResult<String> {
        Ok(format!("{}{}", self.parameter_name(property)?, suffix))
    }

    // === Clause factory ===

    /// Build (or fetch from the per-mapping cache) the predicate
    /// `<table>.<column> <op> @param` for a property.
    pub fn where_(&self, property: &str, op: Operator) -> TesseraResult<WhereClause> {
        let key = (property.to_string(), op);
        {
            let cache = self
                .clause_cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(clause) = cache.get(&key) {
                return Ok(clause.clone());
            }
        }
        let clause = self.build_where(property, None, op)?;
        let mut cache = self
            .clause_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key).or_insert(clause).clone())
    }

    /// Equality predicate shorthand.
    pub fn where_eq(&self, property: &str) -> TesseraResult<WhereClause> {
        self.where_(property, Operator::Equal)
    }

    /// Predicate whose parameter name carries an extra suffix, so two
    /// predicates over the same column can coexist in one statement.
    pub fn where_with_suffix(
        &self,
        property: &str,
        suffix: &str,
        op: Operator,
    ) -> TesseraResult<WhereClause> {
        self.build_where(property, Some(suffix), op)
    }

    fn build_where(
        &self,
        property: &str,
        suffix: Option<&str>,
        op: Operator,
    ) -> TesseraResult<WhereClause> {
        let column = self.mapping.column_for(property)?;
        let qualified_column = format!("{}.{}", self.qualified, column.column);
        if op.takes_parameter() {
            let parameter = match suffix {
                Some(suffix) => self.parameter_name_with_suffix(property, suffix)?,
                None => self.parameter_name(property)?,
            };
            Ok(WhereClause::new(
                format!("{} {} {}", qualified_column, op.sql(), parameter),
                Some(parameter),
            ))
        } else {
            Ok(WhereClause::new(
                format!("{} {}", qualified_column, op.sql()),
                None,
            ))
        }
    }

    /// Ordering term `<table>.<column> ASC|DESC`.
    pub fn order_by(
        &self,
        property: &str,
        direction: SortDirection,
    ) -> TesseraResult<OrderByClause> {
        let column = self.mapping.column_for(property)?;
        Ok(OrderByClause::new(format!(
            "{}.{} {}",
            self.qualified,
            column.column,
            direction.sql()
        )))
    }

    pub fn order_by_ascending(&self, property: &str) -> TesseraResult<OrderByClause> {
        self.order_by(property, SortDirection::Ascending)
    }

    pub fn order_by_descending(&self, property: &str) -> TesseraResult<OrderByClause> {
        self.order_by(property, SortDirection::Descending)
    }

    // === Composition ===

    /// Extend the cached SELECT with, in this fixed order: an `AND
    /// (<where>)` fragment, an `ORDER BY` fragment, then `LIMIT/OFFSET`.
    pub fn generate_select(
        &self,
        where_clause: Option<&WhereClause>,
        order_by: Option<&OrderByClause>,
        page: Option<Page>,
    ) -> String {
        let mut sql = self.select.clone();
        if let Some(clause) = where_clause {
            sql.push_str(" AND (");
            sql.push_str(clause.sql());
            sql.push(')');
        }
        if let Some(order) = order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order.sql());
        }
        if let Some(page) = page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", page.size, page.offset()));
        }
        sql
    }

    /// Extend the cached UPDATE with an extra predicate.
    pub fn generate_update(&self, where_clause: &WhereClause) -> String {
        format!("{} AND ({})", self.update, where_clause.sql())
    }

    /// Extend the cached DELETE with an extra predicate.
    pub fn generate_delete(&self, where_clause: &WhereClause) -> String {
        format!("{} AND ({})", self.delete, where_clause.sql())
    }

    /// EXISTS probe with an extra predicate inside the subquery.
    pub fn generate_exists(&self, where_clause: &WhereClause) -> String {
        format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} AND ({}))",
            self.qualified,
            self.tenant_filter,
            where_clause.sql()
        )
    }
}
