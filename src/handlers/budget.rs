use bookdb_core::{BackendError, Book, Budget, Entity, Instance, ObjectKind};
use bookdb_sqlite::{
    codec::{guid_to_str, str_to_guid},
    SqliteStore,
};
use rusqlite::params;
use uuid::Uuid;

use super::{delete_object, generic_sql, slots, wrong_kind};
use crate::{handler::TypeHandler, query::CompiledQuery};

pub struct BudgetHandler;

impl BudgetHandler {
    fn load(&self, store: &SqliteStore, book: &mut Book, sql: &str) -> Result<Vec<Uuid>, BackendError> {
        let rows: Vec<(String, Budget)> = store.query_rows(sql, [], |row| {
            Ok((
                row.get("guid")?,
                Budget {
                    name: row.get("name")?,
                    description: row.get("description")?,
                    num_periods: row.get("num_periods")?,
                },
            ))
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for (guid, budget) in rows {
            let guid = str_to_guid(&guid)?;
            let mut instance = Instance::loaded(guid, Entity::Budget(budget));
            instance.slots = slots::load(store, &guid)?;
            book.insert_loaded(instance);
            loaded.push(guid);
        }
        Ok(loaded)
    }
}

impl TypeHandler for BudgetHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::Budget.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Budget (
                guid TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                num_periods INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        self.load(store, book, "SELECT * FROM Budget")?;
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::Budget(budget) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, budget))
    }

    fn run_query(
        &self,
        store: &SqliteStore,
        book: &mut Book,
        query: &CompiledQuery,
    ) -> Result<Vec<Uuid>, BackendError> {
        self.load(store, book, generic_sql(query)?)
    }
}

fn save(store: &SqliteStore, instance: &Instance, budget: &Budget) -> Result<(), BackendError> {
    if instance.is_destroying() {
        return delete_object(store, "Budget", instance);
    }
    store.execute(
        "INSERT OR REPLACE INTO Budget (guid, name, description, num_periods)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            guid_to_str(&instance.guid()),
            budget.name,
            budget.description,
            budget.num_periods,
        ],
    )?;
    slots::save(store, &instance.guid(), &instance.slots)
}

#[cfg(test)]
mod tests {
    use bookdb_core::SlotValue;

    use super::*;

    #[test]
    fn budgets_round_trip_with_slots() {
        let store = SqliteStore::open_in_memory().unwrap();
        slots::SlotHandler.create_tables(&store).unwrap();
        BudgetHandler.create_tables(&store).unwrap();

        let mut instance = Instance::new(
            Uuid::new_v4(),
            Entity::Budget(Budget {
                name: "Household".to_string(),
                description: "monthly spending".to_string(),
                num_periods: 12,
            }),
        );
        instance
            .slots
            .insert("owner".to_string(), SlotValue::String("both".to_string()));
        BudgetHandler.commit(&store, &instance).unwrap().unwrap();

        let mut book = Book::empty(Uuid::new_v4());
        BudgetHandler.initial_load(&store, &mut book).unwrap();
        let loaded = book.get(&instance.guid()).unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.entity(), instance.entity());
        assert_eq!(loaded.slots, instance.slots);
    }

    #[test]
    fn destroying_a_budget_deletes_its_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        BudgetHandler.create_tables(&store).unwrap();
        let mut instance = Instance::new(
            Uuid::new_v4(),
            Entity::Budget(Budget {
                name: "Trip".to_string(),
                description: String::new(),
                num_periods: 1,
            }),
        );
        BudgetHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Budget").unwrap(), 1);

        instance.set_destroying(true);
        BudgetHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Budget").unwrap(), 0);
    }
}
