use bookdb_core::{BackendError, Book, Commodity, Entity, Instance, ObjectKind};
use bookdb_sqlite::{
    codec::{guid_to_str, str_to_guid},
    SqliteStore,
};
use rusqlite::params;
use uuid::Uuid;

use super::{delete_object, generic_sql, slots, wrong_kind};
use crate::{handler::TypeHandler, query::CompiledQuery};

pub struct CommodityHandler;

impl CommodityHandler {
    fn load(&self, store: &SqliteStore, book: &mut Book, sql: &str) -> Result<Vec<Uuid>, BackendError> {
        let rows: Vec<(String, Commodity)> = store.query_rows(sql, [], |row| {
            Ok((
                row.get("guid")?,
                Commodity {
                    namespace: row.get("namespace")?,
                    mnemonic: row.get("mnemonic")?,
                    fullname: row.get("fullname")?,
                    fraction: row.get("fraction")?,
                },
            ))
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for (guid, commodity) in rows {
            let guid = str_to_guid(&guid)?;
            let mut instance = Instance::loaded(guid, Entity::Commodity(commodity));
            instance.slots = slots::load(store, &guid)?;
            book.insert_loaded(instance);
            loaded.push(guid);
        }
        Ok(loaded)
    }
}

impl TypeHandler for CommodityHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::Commodity.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Commodity (
                guid TEXT PRIMARY KEY NOT NULL,
                namespace TEXT NOT NULL,
                mnemonic TEXT NOT NULL,
                fullname TEXT NOT NULL,
                fraction INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        let loaded = self.load(store, book, "SELECT * FROM Commodity")?;
        tracing::debug!(count = loaded.len(), "commodities loaded");
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::Commodity(commodity) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, commodity))
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

fn save(store: &SqliteStore, instance: &Instance, commodity: &Commodity) -> Result<(), BackendError> {
    if instance.is_destroying() {
        return delete_object(store, "Commodity", instance);
    }
    store.execute(
        "INSERT OR REPLACE INTO Commodity (guid, namespace, mnemonic, fullname, fraction)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            guid_to_str(&instance.guid()),
            commodity.namespace,
            commodity.mnemonic,
            commodity.fullname,
            commodity.fraction,
        ],
    )?;
    slots::save(store, &instance.guid(), &instance.slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Commodity {
        Commodity {
            namespace: "CURRENCY".to_string(),
            mnemonic: "USD".to_string(),
            fullname: "US Dollar".to_string(),
            fraction: 100,
        }
    }

    #[test]
    fn commodities_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        CommodityHandler.create_tables(&store).unwrap();
        CommodityHandler.create_tables(&store).unwrap();

        let instance = Instance::new(Uuid::new_v4(), Entity::Commodity(usd()));
        CommodityHandler.commit(&store, &instance).unwrap().unwrap();

        let mut book = Book::empty(Uuid::new_v4());
        CommodityHandler.initial_load(&store, &mut book).unwrap();
        let loaded = book.get(&instance.guid()).unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.entity(), instance.entity());
    }

    #[test]
    fn recommitting_a_commodity_replaces_its_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        CommodityHandler.create_tables(&store).unwrap();
        let guid = Uuid::new_v4();
        CommodityHandler
            .commit(&store, &Instance::new(guid, Entity::Commodity(usd())))
            .unwrap()
            .unwrap();

        let mut renamed = usd();
        renamed.fullname = "United States Dollar".to_string();
        let instance = Instance::new(guid, Entity::Commodity(renamed));
        CommodityHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Commodity").unwrap(), 1);

        let mut book = Book::empty(Uuid::new_v4());
        CommodityHandler.initial_load(&store, &mut book).unwrap();
        assert_eq!(book.get(&guid).unwrap().entity(), instance.entity());
    }
}
