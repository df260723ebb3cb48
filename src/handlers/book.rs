use bookdb_core::{BackendError, Book, BookRecord, Entity, Instance, ObjectKind};
use bookdb_sqlite::{
    codec::{guid_to_str, str_to_guid},
    SqliteStore,
};
use rusqlite::params;
use uuid::Uuid;

use super::{delete_object, generic_sql, slots, wrong_kind};
use crate::{handler::TypeHandler, query::CompiledQuery};

pub struct BookHandler;

impl BookHandler {
    fn load(&self, store: &SqliteStore, book: &mut Book, sql: &str) -> Result<Vec<Uuid>, BackendError> {
        let rows: Vec<(String, String, String)> = store.query_rows(sql, [], |row| {
            Ok((
                row.get("guid")?,
                row.get("root_account_guid")?,
                row.get("template_root_guid")?,
            ))
        })?;

        let mut loaded = Vec::new();
        for (guid, root, template) in rows {
            let guid = str_to_guid(&guid)?;
            let record = BookRecord {
                root_account: str_to_guid(&root)?,
                template_root: str_to_guid(&template)?,
            };
            book.install_record(guid, record);
            if let Some(instance) = book.get_mut(&guid) {
                instance.slots = slots::load(store, &guid)?;
            }
            loaded.push(guid);
        }
        Ok(loaded)
    }
}

impl TypeHandler for BookHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::Book.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Book (
                guid TEXT PRIMARY KEY NOT NULL,
                root_account_guid TEXT NOT NULL,
                template_root_guid TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        let loaded = self.load(store, book, "SELECT * FROM Book LIMIT 1")?;
        if loaded.is_empty() {
            tracing::info!("no book record stored; starting a new book");
        }
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::Book(record) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, record))
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

fn save(store: &SqliteStore, instance: &Instance, record: &BookRecord) -> Result<(), BackendError> {
    if instance.is_destroying() {
        return delete_object(store, "Book", instance);
    }
    store.execute(
        "INSERT OR REPLACE INTO Book (guid, root_account_guid, template_root_guid)
         VALUES (?1, ?2, ?3)",
        params![
            guid_to_str(&instance.guid()),
            guid_to_str(&record.root_account),
            guid_to_str(&record.template_root),
        ],
    )?;
    slots::save(store, &instance.guid(), &instance.slots)
}
