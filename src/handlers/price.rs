use bookdb_core::{BackendError, Book, Entity, Instance, ObjectKind, Price};
use bookdb_sqlite::{
    codec::{date_to_str, decimal_to_str, guid_to_str, str_to_date, str_to_decimal, str_to_guid},
    SqliteStore, StoreError,
};
use rusqlite::params;
use uuid::Uuid;

use super::{delete_object, generic_sql, slots, wrong_kind};
use crate::{handler::TypeHandler, query::CompiledQuery};

pub struct PriceHandler;

struct PriceRow {
    guid: String,
    commodity: String,
    currency: String,
    date: String,
    source: String,
    price_type: String,
    value: String,
}

impl PriceRow {
    fn into_instance(self) -> Result<Instance, StoreError> {
        let price = Price {
            commodity: str_to_guid(&self.commodity)?,
            currency: str_to_guid(&self.currency)?,
            date: str_to_date(&self.date)?,
            source: self.source,
            price_type: self.price_type,
            value: str_to_decimal(&self.value)?,
        };
        Ok(Instance::loaded(str_to_guid(&self.guid)?, Entity::Price(price)))
    }
}

impl PriceHandler {
    fn load(&self, store: &SqliteStore, book: &mut Book, sql: &str) -> Result<Vec<Uuid>, BackendError> {
        let rows = store.query_rows(sql, [], |row| {
            Ok(PriceRow {
                guid: row.get("guid")?,
                commodity: row.get("commodity_guid")?,
                currency: row.get("currency_guid")?,
                date: row.get("date")?,
                source: row.get("source")?,
                price_type: row.get("type")?,
                value: row.get("value")?,
            })
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in rows {
            let mut instance = row.into_instance()?;
            let guid = instance.guid();
            instance.slots = slots::load(store, &guid)?;
            book.insert_loaded(instance);
            loaded.push(guid);
        }
        Ok(loaded)
    }
}

impl TypeHandler for PriceHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::Price.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Price (
                guid TEXT PRIMARY KEY NOT NULL,
                commodity_guid TEXT NOT NULL,
                currency_guid TEXT NOT NULL,
                date TEXT NOT NULL,
                source TEXT NOT NULL,
                type TEXT NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        let loaded = self.load(store, book, "SELECT * FROM Price")?;
        tracing::debug!(count = loaded.len(), "prices loaded");
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::Price(price) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, price))
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

fn save(store: &SqliteStore, instance: &Instance, price: &Price) -> Result<(), BackendError> {
    if instance.is_destroying() {
        return delete_object(store, "Price", instance);
    }
    store.execute(
        "INSERT OR REPLACE INTO Price
            (guid, commodity_guid, currency_guid, date, source, type, value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            guid_to_str(&instance.guid()),
            guid_to_str(&price.commodity),
            guid_to_str(&price.currency),
            date_to_str(price.date),
            price.source,
            price.price_type,
            decimal_to_str(&price.value),
        ],
    )?;
    slots::save(store, &instance.guid(), &instance.slots)
}
