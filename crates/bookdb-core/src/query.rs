use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Gt,
    Ge,
    Ne,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Ne => "!=",
        }
    }
}

/// Typed operand of a predicate term.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    String(String),
    Date(OffsetDateTime),
    /// Fixed-point amount. The generic SQL renderer cannot format it yet.
    Numeric(Decimal),
    Guid(Uuid),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
}

impl PredicateValue {
    /// Midnight UTC on the given day.
    pub fn date(date: Date) -> Self {
        PredicateValue::Date(date.with_time(Time::MIDNIGHT).assume_utc())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PredicateValue::String(_) => "string",
            PredicateValue::Date(_) => "date",
            PredicateValue::Numeric(_) => "numeric",
            PredicateValue::Guid(_) => "guid",
            PredicateValue::Int32(_) => "gint32",
            PredicateValue::Int64(_) => "gint64",
            PredicateValue::Double(_) => "double",
            PredicateValue::Boolean(_) => "boolean",
        }
    }
}

/// One leaf comparison: `[NOT] path op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateTerm {
    pub path: Vec<String>,
    pub op: CompareOp,
    pub negated: bool,
    pub value: PredicateValue,
}

impl PredicateTerm {
    /// Build a term from a dotted property path such as `split.account`.
    pub fn new(path: &str, op: CompareOp, value: PredicateValue) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
            op,
            negated: false,
            value,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// A search condition in disjunctive normal form: OR of AND-groups.
/// No groups at all matches everything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryExpression {
    groups: Vec<Vec<PredicateTerm>>,
}

impl QueryExpression {
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: Vec<Vec<PredicateTerm>>) -> Self {
        Self {
            groups: groups.into_iter().filter(|g| !g.is_empty()).collect(),
        }
    }

    /// Single AND-group.
    pub fn all_of(terms: Vec<PredicateTerm>) -> Self {
        Self::from_groups(vec![terms])
    }

    /// Append another alternative.
    pub fn or(mut self, group: Vec<PredicateTerm>) -> Self {
        if !group.is_empty() {
            self.groups.push(group);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<PredicateTerm>] {
        &self.groups
    }

    pub fn terms(&self) -> impl Iterator<Item = &PredicateTerm> {
        self.groups.iter().flatten()
    }
}
