//! Query compilation, execution and release.
//!
//! A [`QueryExpression`] is compiled for one type tag. Handlers that know
//! their own schema may return a [`NativeQuery`]; every other type gets a
//! generic `SELECT` over the table named after its tag, with literals inlined
//! into the statement text.
//!
//! The generic renderer does not escape string literals, so a value holding a
//! quote changes the statement. Handlers that must accept user input should
//! provide a native, parameterized query instead, as the transaction handler
//! does.

use bookdb_core::{BackendError, PredicateTerm, PredicateValue, QueryExpression};
use bookdb_sqlite::codec::{date_to_str, guid_to_str};
use uuid::Uuid;

use crate::{handler::HandlerRegistry, handlers::TransactionQuery, session::Session};

/// Query representations owned by a specific handler.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQuery {
    Transactions(TransactionQuery),
}

/// A compiled query. Opaque to callers apart from the type it searches for.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    Sql { search_for: String, sql: String },
    Native { search_for: String, query: NativeQuery },
}

impl CompiledQuery {
    pub fn search_for(&self) -> &str {
        match self {
            CompiledQuery::Sql { search_for, .. } | CompiledQuery::Native { search_for, .. } => {
                search_for
            }
        }
    }

    /// Statement text, whichever path produced it.
    pub fn sql(&self) -> &str {
        match self {
            CompiledQuery::Sql { sql, .. } => sql,
            CompiledQuery::Native {
                query: NativeQuery::Transactions(q),
                ..
            } => &q.sql,
        }
    }
}

/// Compile `expr` for the objects tagged `search_for`.
pub fn compile_query(
    registry: &HandlerRegistry,
    search_for: &str,
    expr: &QueryExpression,
) -> CompiledQuery {
    if let Some(query) = registry
        .lookup(search_for)
        .and_then(|handler| handler.compile_query(expr))
    {
        tracing::debug!(search_for, "query compiled by handler");
        return CompiledQuery::Native {
            search_for: search_for.to_string(),
            query,
        };
    }

    let sql = render_sql(search_for, expr);
    tracing::debug!(search_for, sql = %sql, "query compiled");
    CompiledQuery::Sql {
        search_for: search_for.to_string(),
        sql,
    }
}

/// Render the generic `SELECT` for a table.
pub fn render_sql(table: &str, expr: &QueryExpression) -> String {
    let mut sql = format!("SELECT * from {}", table);
    if expr.is_empty() {
        return sql;
    }

    let groups: Vec<String> = expr
        .groups()
        .iter()
        .map(|group| {
            let terms: Vec<String> = group.iter().map(render_term).collect();
            format!("({})", terms.join(" AND "))
        })
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&groups.join(" OR "));
    sql
}

fn render_term(term: &PredicateTerm) -> String {
    format!(
        "({}{}{}{})",
        if term.negated { "NOT " } else { "" },
        term.dotted_path(),
        term.op.as_sql(),
        render_literal(&term.value)
    )
}

/// Inline a literal into statement text.
pub fn render_literal(value: &PredicateValue) -> String {
    match value {
        PredicateValue::String(s) => format!("'{}'", s),
        PredicateValue::Date(dt) => format!("'{}'", date_to_str(dt.date())),
        PredicateValue::Guid(g) => format!("'{}'", guid_to_str(g)),
        PredicateValue::Int32(i) => i.to_string(),
        PredicateValue::Int64(i) => i.to_string(),
        PredicateValue::Double(d) => format!("{:.6}", d),
        PredicateValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
        // TODO: format fixed-point amounts once the column encoding for
        // numerics is shared by every handler.
        PredicateValue::Numeric(_) => "numeric".to_string(),
    }
}

impl Session {
    pub fn compile_query(&self, search_for: &str, expr: &QueryExpression) -> CompiledQuery {
        compile_query(self.registry(), search_for, expr)
    }

    /// Run a compiled query, materializing matches into the attached book.
    ///
    /// Only one query may run on a session at a time; a second call made
    /// while one is in flight fails with [`BackendError::QueryInProgress`].
    pub fn run_query(&mut self, query: &CompiledQuery) -> Result<Vec<Uuid>, BackendError> {
        if self.in_query {
            tracing::warn!(search_for = query.search_for(), "query rejected, another is running");
            return Err(BackendError::QueryInProgress);
        }
        let store = self.store.as_ref().ok_or(BackendError::NotConnected)?;
        let book = self.book.as_mut().ok_or(BackendError::NoBook)?;

        let Some(handler) = self.registry.lookup(query.search_for()) else {
            tracing::debug!(search_for = query.search_for(), "no handler for query type");
            return Ok(Vec::new());
        };

        self.loading = true;
        self.in_query = true;
        book.suspend_events();

        let result = handler.run_query(store, book, query);

        book.resume_events();
        self.loading = false;
        self.in_query = false;
        book.mark_saved();

        match &result {
            Ok(found) => tracing::debug!(search_for = query.search_for(), count = found.len(), "query ran"),
            Err(e) => tracing::error!(search_for = query.search_for(), error = %e, "query failed"),
        }
        result
    }

    /// Release a compiled query.
    pub fn free_query(&self, query: CompiledQuery) {
        let released = self
            .registry
            .lookup(query.search_for())
            .map(|handler| handler.free_query(&query))
            .unwrap_or(false);
        if !released {
            tracing::debug!(search_for = query.search_for(), "generic query released");
        }
    }
}

#[cfg(test)]
mod tests {
    use bookdb_core::CompareOp;
    use rust_decimal_macros::dec;
    use time::{Date, Month};

    use super::*;
    use crate::handlers::standard_registry;

    fn amount_over(n: i64) -> PredicateTerm {
        PredicateTerm::new("amount", CompareOp::Gt, PredicateValue::Int64(n))
    }

    #[test]
    fn empty_expression_selects_the_whole_table() {
        let registry = HandlerRegistry::new();
        let q = compile_query(&registry, "Foo", &QueryExpression::match_all());
        assert_eq!(q, CompiledQuery::Sql {
            search_for: "Foo".to_string(),
            sql: "SELECT * from Foo".to_string(),
        });
        assert_eq!(q.search_for(), "Foo");
    }

    #[test]
    fn single_term_renders_without_spaces() {
        let sql = render_sql("Foo", &QueryExpression::all_of(vec![amount_over(100)]));
        assert!(sql.contains("(amount>100)"), "{}", sql);
        assert_eq!(sql, "SELECT * from Foo WHERE ((amount>100))");
    }

    #[test]
    fn groups_are_parenthesized_and_or_joined() {
        let expr = QueryExpression::all_of(vec![
            amount_over(100),
            PredicateTerm::new("memo", CompareOp::Ne, PredicateValue::String("rent".into())),
        ])
        .or(vec![PredicateTerm::new("reconciled", CompareOp::Eq, PredicateValue::Boolean(true)).negate()]);

        assert_eq!(
            render_sql("Split", &expr),
            "SELECT * from Split WHERE ((amount>100) AND (memo!='rent')) OR (NOT reconciled=1)"
        );
    }

    #[test]
    fn literals_are_formatted_by_type() {
        let guid = Uuid::parse_str("0123456789abcdef0123456789abcdef").unwrap();
        let date = Date::from_calendar_date(2009, Month::July, 4).unwrap();
        assert_eq!(render_literal(&PredicateValue::date(date)), "'2009-07-04'");
        assert_eq!(
            render_literal(&PredicateValue::Guid(guid)),
            "'0123456789abcdef0123456789abcdef'"
        );
        assert_eq!(render_literal(&PredicateValue::Int32(-7)), "-7");
        assert_eq!(render_literal(&PredicateValue::Double(2.5)), "2.500000");
        assert_eq!(render_literal(&PredicateValue::Boolean(false)), "0");
        assert_eq!(render_literal(&PredicateValue::Numeric(dec!(3.50))), "numeric");
        assert_eq!(render_literal(&PredicateValue::String("it's".into())), "'it's'");
    }

    #[test]
    fn handlers_with_native_queries_take_over() {
        let registry = standard_registry().unwrap();
        let q = compile_query(&registry, "Trans", &QueryExpression::match_all());
        assert!(matches!(q, CompiledQuery::Native { .. }));
        assert_eq!(q.search_for(), "Trans");
        assert!(q.sql().starts_with("SELECT DISTINCT t.* FROM Trans t"));

        let q = compile_query(&registry, "Account", &QueryExpression::match_all());
        assert_eq!(q.sql(), "SELECT * from Account");
    }

    #[test]
    fn second_query_is_rejected_while_one_runs() {
        let mut session = Session::new(std::sync::Arc::new(standard_registry().unwrap()));
        session.begin_in_memory().unwrap();
        session.attach(bookdb_core::Book::new()).unwrap();

        let query = session.compile_query("Account", &QueryExpression::match_all());
        session.in_query = true;
        assert!(matches!(session.run_query(&query), Err(BackendError::QueryInProgress)));
        assert!(session.in_query);

        session.in_query = false;
        assert!(session.run_query(&query).is_ok());
        assert!(!session.in_query);
        assert!(!session.is_loading());
    }
}
