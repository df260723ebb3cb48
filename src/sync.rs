use std::collections::HashSet;

use bookdb_core::{BackendError, Book, ObjectKind};
use uuid::Uuid;

use crate::session::Session;

/// Counts from a full rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub tables_dropped: usize,
    pub objects_saved: usize,
    pub failures: usize,
}

/// Every object written by a full rebuild, in write order, each once.
///
/// Commodities are not part of the rebuild.
pub fn save_order(book: &Book) -> Vec<Uuid> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |guid: Uuid, order: &mut Vec<Uuid>| {
        if seen.insert(guid) {
            order.push(guid);
        }
    };

    if book.record().is_some() {
        push(book.guid(), &mut order);
    }

    if let Some(root) = book.root_account() {
        push(root, &mut order);
        for guid in book.descendants(&root) {
            push(guid, &mut order);
        }
    }

    for price in book.of_kind(ObjectKind::Price) {
        push(price.guid(), &mut order);
    }

    if let Some(root) = book.root_account() {
        for guid in book.tree_transactions(&root) {
            push(guid, &mut order);
        }
    }

    if let Some(template) = book.template_root() {
        let template_accounts = book.descendants(&template);
        if !template_accounts.is_empty() {
            push(template, &mut order);
            for guid in template_accounts {
                push(guid, &mut order);
            }
            for guid in book.tree_transactions(&template) {
                push(guid, &mut order);
            }
        }
    }

    for sx in book.of_kind(ObjectKind::ScheduledTransaction) {
        push(sx.guid(), &mut order);
    }
    for budget in book.of_kind(ObjectKind::Budget) {
        push(budget.guid(), &mut order);
    }
    order
}

impl Session {
    /// Rebuild the database from the attached book.
    ///
    /// Every existing table is dropped, handler tables are recreated and the
    /// book is written out. Nothing runs inside a database transaction: a
    /// failure part way leaves a partially written database. Individual
    /// failures are logged and counted, not returned. Only objects that were
    /// written are marked clean.
    pub fn sync_all(&mut self) -> Result<SyncReport, BackendError> {
        if self.book.is_none() {
            return Err(BackendError::NoBook);
        }
        let mut report = SyncReport::default();

        {
            let store = self.store()?;
            let tables = store.list_tables().unwrap_or_else(|e| {
                tracing::error!(error = %e, "cannot list tables");
                Vec::new()
            });
            for table in tables {
                match store.drop_table(&table) {
                    Ok(()) => report.tables_dropped += 1,
                    Err(e) => tracing::error!(table = %table, error = %e, "cannot drop table"),
                }
            }
        }

        if let Err(e) = self.refresh_schema() {
            tracing::error!(error = %e, "schema refresh failed");
        }
        self.create_all_tables();
        if let Err(e) = self.refresh_schema() {
            tracing::error!(error = %e, "schema refresh failed");
        }

        let store = self.store.as_ref().ok_or(BackendError::NotConnected)?;
        let book = self.book.as_mut().ok_or(BackendError::NoBook)?;
        let mut saved = Vec::new();
        for guid in save_order(book) {
            let Some(instance) = book.get(&guid) else {
                continue;
            };
            if instance.is_destroying() {
                continue;
            }
            let type_tag = instance.type_tag();
            let result = self
                .registry
                .lookup(type_tag)
                .and_then(|handler| handler.commit(store, instance))
                .unwrap_or_else(|| Err(BackendError::UnknownObjectType(type_tag.to_string())));
            match result {
                Ok(()) => saved.push(guid),
                Err(e) => {
                    report.failures += 1;
                    tracing::error!(guid = %guid, type_tag, error = %e, "cannot save object");
                }
            }
        }

        report.objects_saved = saved.len();
        for guid in &saved {
            if let Some(instance) = book.get_mut(guid) {
                instance.mark_clean();
            }
        }
        // Objects the rebuild did not write (commodities, failed rows) keep
        // their dirty flag.
        if report.failures == 0 {
            book.mark_saved();
        } else {
            book.mark_dirty();
        }
        tracing::info!(
            dropped = report.tables_dropped,
            saved = report.objects_saved,
            failures = report.failures,
            "full sync finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use bookdb_core::{Account, AccountType, Budget, Entity, Split, Transaction};
    use rust_decimal_macros::dec;
    use time::{Date, Month};

    use super::*;

    fn synced_session(registry: crate::HandlerRegistry, book: Book) -> Session {
        let mut session = Session::new(std::sync::Arc::new(registry));
        session.begin_in_memory().unwrap();
        session.attach(book).unwrap();
        session
    }

    #[test]
    fn failed_rows_are_counted_and_stay_dirty() {
        let registry = crate::HandlerRegistry::new();
        registry.register(std::sync::Arc::new(crate::handlers::BookHandler)).unwrap();
        registry.register(std::sync::Arc::new(crate::handlers::AccountHandler)).unwrap();

        let mut book = Book::new();
        let root = book.root_account().unwrap();
        let budget = book.insert(Entity::Budget(Budget {
            name: "2024".to_string(),
            description: String::new(),
            num_periods: 12,
        }));
        let mut session = synced_session(registry, book);

        let report = session.sync_all().unwrap();
        assert_eq!(report.failures, 1);
        assert_eq!(report.objects_saved, 2);
        assert_eq!(session.store().unwrap().count_rows("Account").unwrap(), 1);

        let book = session.book().unwrap();
        assert!(book.get(&budget).unwrap().is_dirty());
        assert!(!book.get(&root).unwrap().is_dirty());
        assert!(book.is_dirty());
    }

    #[test]
    fn commodities_stay_dirty_until_committed() {
        let mut book = Book::new();
        let usd = book.insert(Entity::Commodity(bookdb_core::Commodity {
            namespace: "CURRENCY".to_string(),
            mnemonic: "USD".to_string(),
            fullname: "US Dollar".to_string(),
            fraction: 100,
        }));
        let mut session = synced_session(crate::standard_registry().unwrap(), book);

        let report = session.sync_all().unwrap();
        assert_eq!(report.failures, 0);
        assert!(session.book().unwrap().get(&usd).unwrap().is_dirty());
        assert_eq!(session.store().unwrap().count_rows("Commodity").unwrap(), 0);

        session.commit_edit(&usd).unwrap();
        assert_eq!(session.store().unwrap().count_rows("Commodity").unwrap(), 1);
        assert!(!session.book().unwrap().is_dirty());
    }

    #[test]
    fn template_tree_is_skipped_when_empty() {
        let mut book = Book::new();
        let root = book.root_account().unwrap();
        let cash = book.insert(Entity::Account(Account::new("Cash", AccountType::Cash, Some(root))));
        let budget = book.insert(Entity::Budget(Budget {
            name: "2024".to_string(),
            description: String::new(),
            num_periods: 12,
        }));

        let order = save_order(&book);
        assert_eq!(order, vec![book.guid(), root, cash, budget]);
        assert!(!order.contains(&book.template_root().unwrap()));
    }

    #[test]
    fn template_transactions_follow_template_accounts() {
        let mut book = Book::new();
        let template = book.template_root().unwrap();
        let rent = book.insert(Entity::Account(Account::new("Rent", AccountType::Expense, Some(template))));
        let date = Date::from_calendar_date(2024, Month::June, 1).unwrap();
        let txn = book.insert(Entity::Transaction(Transaction::new(
            date,
            "monthly rent",
            vec![Split::new(rent, dec!(800))],
        )));

        let order = save_order(&book);
        let pos = |g: Uuid| order.iter().position(|o| *o == g).unwrap();
        assert!(pos(template) < pos(rent));
        assert!(pos(rent) < pos(txn));
        assert_eq!(order.iter().filter(|g| **g == txn).count(), 1);
    }
}
