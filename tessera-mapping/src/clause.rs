//! Composable predicate and ordering fragments.
//!
//! `WhereClause` and `OrderByClause` are immutable value wrappers around
//! finished SQL text (plus, for predicates, a parameter binding set).
//! Combinators never mutate operands: `a & b` chains with AND, `a | b`
//! wraps in parentheses and joins with OR, `a + b` joins order terms
//! with a comma. OR always parenthesizes so precedence survives
//! chaining with AND; AND stays flat, producing left-to-right chains.

use crate::types::ColumnValue;
use std::ops::{Add, BitAnd, BitOr};

/// Comparison operator with a fixed textual rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Like,
    ILike,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// SQL rendering of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Null tests take no parameter; everything else takes exactly one.
    pub fn takes_parameter(self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

/// Sort direction for an order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// One named parameter of a predicate, with its value once bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Option<ColumnValue>,
}

/// Immutable predicate fragment plus its parameter binding set.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    sql: String,
    bindings: Vec<Binding>,
}

impl WhereClause {
    pub(crate) fn new(sql: String, parameter: Option<String>) -> Self {
        let bindings = parameter
            .into_iter()
            .map(|name| Binding { name, value: None })
            .collect();
        Self { sql, bindings }
    }

    /// The finished predicate text, e.g. `reg.asset.name = @reg_asset_name`.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// All parameters of this fragment, in appearance order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Attach a value to the first unbound parameter. Single-parameter
    /// clauses bind before combination; combined clauses use
    /// [`WhereClause::bind_named`].
    pub fn bind(mut self, value: ColumnValue) -> Self {
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.value.is_none()) {
            binding.value = Some(value);
        }
        self
    }

    /// Attach a value to the parameter with the given name.
    pub fn bind_named(mut self, name: &str, value: ColumnValue) -> Self {
        if let Some(binding) = self.bindings.iter_mut().find(|b| b.name == name) {
            binding.value = Some(value);
        }
        self
    }

    fn combine(self, other: WhereClause, sql: String) -> WhereClause {
        let mut bindings = self.bindings;
        bindings.extend(other.bindings);
        WhereClause { sql, bindings }
    }
}

impl BitAnd for WhereClause {
    type Output = WhereClause;

    /// `a & b` renders as `a AND b` - no redundant parentheses, so
    /// chains stay flat left to right.
    fn bitand(self, other: WhereClause) -> WhereClause {
        let sql = format!("{} AND {}", self.sql, other.sql);
        self.combine(other, sql)
    }
}

impl BitOr for WhereClause {
    type Output = WhereClause;

    /// `a | b` renders as `(a OR b)` - always parenthesized to keep
    /// precedence when the result is chained with AND.
    fn bitor(self, other: WhereClause) -> WhereClause {
        let sql = format!("({} OR {})", self.sql, other.sql);
        self.combine(other, sql)
    }
}

/// Immutable ordering fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByClause {
    sql: String,
}

impl OrderByClause {
    pub(crate) fn new(sql: String) -> Self {
        Self { sql }
    }

    /// The finished order text, e.g. `reg.asset.name ASC`.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl Add for OrderByClause {
    type Output = OrderByClause;

    /// `a + b` concatenates order terms with `, `.
    fn add(self, other: OrderByClause) -> OrderByClause {
        OrderByClause {
            sql: format!("{}, {}", self.sql, other.sql),
        }
    }
}
