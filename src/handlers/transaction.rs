use bookdb_core::{
    BackendError, Book, Entity, Instance, ObjectKind, PredicateTerm, PredicateValue,
    QueryExpression, Split, Transaction,
};
use bookdb_sqlite::{
    codec::{
        date_to_str, decimal_to_str, guid_to_str, opt_str_to_guid, str_to_date, str_to_decimal,
        str_to_guid, timestamp_to_datetime,
    },
    SqliteStore, StoreError,
};
use rusqlite::{params, params_from_iter, types::Value};
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use super::{slots, wrong_kind};
use crate::{
    handler::TypeHandler,
    query::{CompiledQuery, NativeQuery},
};

/// Parameterized search over transactions. Every literal is bound, never
/// inlined into the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnKind {
    Text,
    Amount,
    Timestamp,
}

/// Resolve a property path to a column expression of the `Trans t` /
/// `Split s` join.
fn resolve_path(path: &[String]) -> Option<(&'static str, ColumnKind, bool)> {
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    let resolved = match segments.as_slice() {
        ["guid"] => ("t.guid", ColumnKind::Text, false),
        ["currency"] => ("t.currency_guid", ColumnKind::Text, false),
        ["num"] => ("t.num", ColumnKind::Text, false),
        ["post_date"] | ["date"] => ("t.post_date", ColumnKind::Text, false),
        ["enter_date"] => ("t.enter_date", ColumnKind::Timestamp, false),
        ["description"] => ("t.description", ColumnKind::Text, false),
        ["split", "guid"] => ("s.guid", ColumnKind::Text, true),
        ["split", "account"] => ("s.account_guid", ColumnKind::Text, true),
        ["split", "memo"] => ("s.memo", ColumnKind::Text, true),
        ["split", "reconcile"] => ("s.reconcile_state", ColumnKind::Text, true),
        ["split", "value"] => ("CAST(s.value AS REAL)", ColumnKind::Amount, true),
        ["split", "quantity"] => ("CAST(s.quantity AS REAL)", ColumnKind::Amount, true),
        _ => return None,
    };
    Some(resolved)
}

fn bind(value: &PredicateValue, kind: ColumnKind) -> Value {
    match (value, kind) {
        (PredicateValue::Date(dt), ColumnKind::Timestamp) => Value::Integer(dt.unix_timestamp()),
        (PredicateValue::Date(dt), _) => Value::Text(date_to_str(dt.date())),
        (PredicateValue::Numeric(n), ColumnKind::Amount) => Value::Real(n.to_f64().unwrap_or(0.0)),
        (PredicateValue::Numeric(n), _) => Value::Text(decimal_to_str(n)),
        (PredicateValue::Int32(i), ColumnKind::Amount) => Value::Real(f64::from(*i)),
        (PredicateValue::Int64(i), ColumnKind::Amount) => Value::Real(*i as f64),
        (PredicateValue::String(s), _) => Value::Text(s.clone()),
        (PredicateValue::Guid(g), _) => Value::Text(guid_to_str(g)),
        (PredicateValue::Int32(i), _) => Value::Integer(i64::from(*i)),
        (PredicateValue::Int64(i), _) => Value::Integer(*i),
        (PredicateValue::Double(d), _) => Value::Real(*d),
        (PredicateValue::Boolean(b), _) => Value::Integer(i64::from(*b)),
    }
}

/// Build the parameterized statement, or `None` when a term names a
/// property this handler does not know.
pub fn compile(expr: &QueryExpression) -> Option<TransactionQuery> {
    let mut params = Vec::new();
    let mut join_splits = false;
    let mut groups = Vec::with_capacity(expr.groups().len());

    for group in expr.groups() {
        let mut terms = Vec::with_capacity(group.len());
        for term in group {
            let (column, kind, on_split) = resolve_path(&term.path)?;
            join_splits |= on_split;
            params.push(bind(&term.value, kind));
            terms.push(render_term(term, column, params.len()));
        }
        groups.push(format!("({})", terms.join(" AND ")));
    }

    let mut sql = String::from("SELECT DISTINCT t.* FROM Trans t");
    if join_splits {
        sql.push_str(" JOIN Split s ON s.tx_guid = t.guid");
    }
    if !groups.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&groups.join(" OR "));
    }
    sql.push_str(" ORDER BY t.post_date, t.guid");
    Some(TransactionQuery { sql, params })
}

fn render_term(term: &PredicateTerm, column: &str, index: usize) -> String {
    let not = if term.negated { "NOT " } else { "" };
    format!("({}{} {} ?{})", not, column, term.op.as_sql(), index)
}

pub struct TransactionHandler;

struct TransRow {
    guid: String,
    currency: Option<String>,
    num: String,
    post_date: String,
    enter_date: i64,
    description: String,
}

struct SplitRow {
    guid: String,
    account: String,
    memo: String,
    reconcile: String,
    value: String,
    quantity: String,
}

impl SplitRow {
    fn into_split(self) -> Result<Split, StoreError> {
        Ok(Split {
            guid: str_to_guid(&self.guid)?,
            account: str_to_guid(&self.account)?,
            memo: self.memo,
            reconcile: self.reconcile.chars().next().unwrap_or('n'),
            value: str_to_decimal(&self.value)?,
            quantity: str_to_decimal(&self.quantity)?,
        })
    }
}

impl TransactionHandler {
    fn load<P: rusqlite::Params>(
        &self,
        store: &SqliteStore,
        book: &mut Book,
        sql: &str,
        params: P,
    ) -> Result<Vec<Uuid>, BackendError> {
        let rows = store.query_rows(sql, params, |row| {
            Ok(TransRow {
                guid: row.get("guid")?,
                currency: row.get("currency_guid")?,
                num: row.get("num")?,
                post_date: row.get("post_date")?,
                enter_date: row.get("enter_date")?,
                description: row.get("description")?,
            })
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in rows {
            let guid = str_to_guid(&row.guid)?;
            let txn = Transaction {
                currency: opt_str_to_guid(row.currency)?,
                num: row.num,
                post_date: str_to_date(&row.post_date)?,
                enter_date: timestamp_to_datetime(row.enter_date)?,
                description: row.description,
                splits: load_splits(store, &guid)?,
            };
            let mut instance = Instance::loaded(guid, Entity::Transaction(txn));
            instance.slots = slots::load(store, &guid)?;
            book.insert_loaded(instance);
            loaded.push(guid);
        }
        Ok(loaded)
    }
}

impl TypeHandler for TransactionHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::Transaction.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Trans (
                guid TEXT PRIMARY KEY NOT NULL,
                currency_guid TEXT,
                num TEXT NOT NULL,
                post_date TEXT NOT NULL,
                enter_date INTEGER NOT NULL,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS Split (
                guid TEXT PRIMARY KEY NOT NULL,
                tx_guid TEXT NOT NULL,
                account_guid TEXT NOT NULL,
                memo TEXT NOT NULL,
                reconcile_state TEXT NOT NULL,
                value TEXT NOT NULL,
                quantity TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS split_tx_guid ON Split (tx_guid);
            CREATE INDEX IF NOT EXISTS split_account_guid ON Split (account_guid);",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        let loaded = self.load(store, book, "SELECT * FROM Trans ORDER BY post_date, guid", [])?;
        tracing::debug!(count = loaded.len(), "transactions loaded");
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::Transaction(txn) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, txn))
    }

    fn commit_children(&self, store: &SqliteStore, instance: &Instance) -> Result<(), BackendError> {
        match instance.entity() {
            Entity::Transaction(txn) => save_splits(store, &instance.guid(), &txn.splits),
            _ => Err(wrong_kind(self.type_tag(), instance)),
        }
    }

    fn compile_query(&self, query: &QueryExpression) -> Option<NativeQuery> {
        compile(query).map(NativeQuery::Transactions)
    }

    fn run_query(
        &self,
        store: &SqliteStore,
        book: &mut Book,
        query: &CompiledQuery,
    ) -> Result<Vec<Uuid>, BackendError> {
        match query {
            CompiledQuery::Native {
                query: NativeQuery::Transactions(q),
                ..
            } => self.load(store, book, &q.sql, params_from_iter(q.params.iter())),
            CompiledQuery::Sql { sql, .. } => self.load(store, book, sql, []),
        }
    }

    fn free_query(&self, query: &CompiledQuery) -> bool {
        match query {
            CompiledQuery::Native { .. } => {
                tracing::trace!("transaction query released");
                true
            }
            CompiledQuery::Sql { .. } => false,
        }
    }
}

fn load_splits(store: &SqliteStore, tx_guid: &Uuid) -> Result<Vec<Split>, BackendError> {
    let rows = store.query_rows(
        "SELECT guid, account_guid, memo, reconcile_state, value, quantity
         FROM Split WHERE tx_guid = ?1 ORDER BY rowid",
        params![guid_to_str(tx_guid)],
        |row| {
            Ok(SplitRow {
                guid: row.get(0)?,
                account: row.get(1)?,
                memo: row.get(2)?,
                reconcile: row.get(3)?,
                value: row.get(4)?,
                quantity: row.get(5)?,
            })
        },
    )?;
    let splits = rows
        .into_iter()
        .map(SplitRow::into_split)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(splits)
}

/// Make the stored splits of a transaction match `splits` exactly.
fn save_splits(store: &SqliteStore, tx_guid: &Uuid, splits: &[Split]) -> Result<(), BackendError> {
    let tx = guid_to_str(tx_guid);
    store.execute("DELETE FROM Split WHERE tx_guid = ?1", params![tx])?;
    for split in splits {
        store.execute(
            "INSERT OR REPLACE INTO Split
                (guid, tx_guid, account_guid, memo, reconcile_state, value, quantity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                guid_to_str(&split.guid),
                tx,
                guid_to_str(&split.account),
                split.memo,
                split.reconcile.to_string(),
                decimal_to_str(&split.value),
                decimal_to_str(&split.quantity),
            ],
        )?;
    }
    Ok(())
}

fn save(store: &SqliteStore, instance: &Instance, txn: &Transaction) -> Result<(), BackendError> {
    let guid = instance.guid();
    if instance.is_destroying() {
        let tx = guid_to_str(&guid);
        store.execute("DELETE FROM Split WHERE tx_guid = ?1", params![tx])?;
        store.execute("DELETE FROM Trans WHERE guid = ?1", params![tx])?;
        slots::delete(store, &guid)?;
        tracing::debug!(guid = %guid, "transaction deleted");
        return Ok(());
    }

    store.execute(
        "INSERT OR REPLACE INTO Trans
            (guid, currency_guid, num, post_date, enter_date, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            guid_to_str(&guid),
            txn.currency.as_ref().map(guid_to_str),
            txn.num,
            date_to_str(txn.post_date),
            txn.enter_date.unix_timestamp(),
            txn.description,
        ],
    )?;
    save_splits(store, &guid, &txn.splits)?;
    slots::save(store, &guid, &instance.slots)
}

#[cfg(test)]
mod tests {
    use bookdb_core::CompareOp;
    use rust_decimal_macros::dec;
    use time::{Date, Month};

    use super::*;

    fn day(d: u8) -> Date {
        Date::from_calendar_date(2024, Month::March, d).unwrap()
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        TransactionHandler.create_tables(&store).unwrap();
        store
    }

    #[test]
    fn compiled_statement_binds_every_literal() {
        let account = Uuid::new_v4();
        let expr = QueryExpression::all_of(vec![
            PredicateTerm::new("split.account", CompareOp::Eq, PredicateValue::Guid(account)),
            PredicateTerm::new("description", CompareOp::Eq, PredicateValue::String("x' OR 1=1".into()))
                .negate(),
        ]);
        let q = compile(&expr).unwrap();
        assert_eq!(
            q.sql,
            "SELECT DISTINCT t.* FROM Trans t JOIN Split s ON s.tx_guid = t.guid \
             WHERE ((s.account_guid = ?1) AND (NOT t.description = ?2)) \
             ORDER BY t.post_date, t.guid"
        );
        assert_eq!(
            q.params,
            vec![
                Value::Text(guid_to_str(&account)),
                Value::Text("x' OR 1=1".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_paths_fall_back_to_generic_sql() {
        let expr = QueryExpression::all_of(vec![PredicateTerm::new(
            "split.lot",
            CompareOp::Eq,
            PredicateValue::Int32(1),
        )]);
        assert!(compile(&expr).is_none());
        assert!(compile(&QueryExpression::match_all()).is_some());
    }

    #[test]
    fn splits_follow_their_transaction() {
        let store = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut txn = Transaction::new(
            day(4),
            "groceries",
            vec![Split::new(a, dec!(-42.10)), Split::new(b, dec!(42.10))],
        );
        let mut instance = Instance::new(Uuid::new_v4(), Entity::Transaction(txn.clone()));
        TransactionHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Split").unwrap(), 2);

        txn.splits.pop();
        let trimmed = Instance::new(instance.guid(), Entity::Transaction(txn));
        TransactionHandler.commit_children(&store, &trimmed).unwrap();
        assert_eq!(store.count_rows("Split").unwrap(), 1);

        instance.set_destroying(true);
        TransactionHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Split").unwrap(), 0);
        assert_eq!(store.count_rows("Trans").unwrap(), 0);
    }

    #[test]
    fn native_query_finds_transactions_by_split_account() {
        let store = store();
        let checking = Uuid::new_v4();
        let groceries = Uuid::new_v4();
        let rent = Uuid::new_v4();

        let shop = Instance::new(
            Uuid::new_v4(),
            Entity::Transaction(Transaction::new(
                day(2),
                "shop",
                vec![Split::new(checking, dec!(-20)), Split::new(groceries, dec!(20))],
            )),
        );
        let pay_rent = Instance::new(
            Uuid::new_v4(),
            Entity::Transaction(Transaction::new(
                day(1),
                "rent",
                vec![Split::new(checking, dec!(-900)), Split::new(rent, dec!(900))],
            )),
        );
        for i in [&shop, &pay_rent] {
            TransactionHandler.commit(&store, i).unwrap().unwrap();
        }

        let by_account = QueryExpression::all_of(vec![PredicateTerm::new(
            "split.account",
            CompareOp::Eq,
            PredicateValue::Guid(checking),
        )]);
        let query = CompiledQuery::Native {
            search_for: "Trans".to_string(),
            query: TransactionHandler.compile_query(&by_account).unwrap(),
        };
        let mut book = Book::empty(Uuid::new_v4());
        let found = TransactionHandler.run_query(&store, &mut book, &query).unwrap();
        assert_eq!(found, vec![pay_rent.guid(), shop.guid()]);
        assert_eq!(book.get(&shop.guid()).unwrap().entity(), shop.entity());

        let large = QueryExpression::all_of(vec![PredicateTerm::new(
            "split.value",
            CompareOp::Ge,
            PredicateValue::Numeric(dec!(100)),
        )]);
        let query = CompiledQuery::Native {
            search_for: "Trans".to_string(),
            query: TransactionHandler.compile_query(&large).unwrap(),
        };
        let mut book = Book::empty(Uuid::new_v4());
        assert_eq!(
            TransactionHandler.run_query(&store, &mut book, &query).unwrap(),
            vec![pay_rent.guid()]
        );
        assert!(TransactionHandler.free_query(&query));
    }
}
