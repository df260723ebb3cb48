use bookdb_core::{Account, AccountType, BackendError, Book, Entity, Instance, ObjectKind};
use bookdb_sqlite::{
    codec::{guid_to_str, opt_str_to_guid, str_to_guid},
    SqliteStore, StoreError,
};
use rusqlite::params;
use uuid::Uuid;

use super::{delete_object, generic_sql, slots, wrong_kind};
use crate::{handler::TypeHandler, query::CompiledQuery};

pub struct AccountHandler;

struct AccountRow {
    guid: String,
    name: String,
    account_type: String,
    commodity: Option<String>,
    parent: Option<String>,
    code: String,
    description: String,
}

impl AccountRow {
    fn into_instance(self) -> Result<Instance, StoreError> {
        let account_type = AccountType::parse(&self.account_type)
            .ok_or_else(|| StoreError::decode("account_type", &self.account_type))?;
        let account = Account {
            name: self.name,
            account_type,
            commodity: opt_str_to_guid(self.commodity)?,
            parent: opt_str_to_guid(self.parent)?,
            code: self.code,
            description: self.description,
        };
        Ok(Instance::loaded(str_to_guid(&self.guid)?, Entity::Account(account)))
    }
}

impl AccountHandler {
    fn load(&self, store: &SqliteStore, book: &mut Book, sql: &str) -> Result<Vec<Uuid>, BackendError> {
        let rows = store.query_rows(sql, [], |row| {
            Ok(AccountRow {
                guid: row.get("guid")?,
                name: row.get("name")?,
                account_type: row.get("account_type")?,
                commodity: row.get("commodity_guid")?,
                parent: row.get("parent_guid")?,
                code: row.get("code")?,
                description: row.get("description")?,
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

impl TypeHandler for AccountHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::Account.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Account (
                guid TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                account_type TEXT NOT NULL,
                commodity_guid TEXT,
                parent_guid TEXT,
                code TEXT NOT NULL,
                description TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        let loaded = self.load(store, book, "SELECT * FROM Account")?;
        tracing::debug!(count = loaded.len(), "accounts loaded");
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::Account(account) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, account))
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

fn save(store: &SqliteStore, instance: &Instance, account: &Account) -> Result<(), BackendError> {
    if instance.is_destroying() {
        return delete_object(store, "Account", instance);
    }
    store.execute(
        "INSERT OR REPLACE INTO Account
            (guid, name, account_type, commodity_guid, parent_guid, code, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            guid_to_str(&instance.guid()),
            account.name,
            account.account_type.as_str(),
            account.commodity.as_ref().map(guid_to_str),
            account.parent.as_ref().map(guid_to_str),
            account.code,
            account.description,
        ],
    )?;
    slots::save(store, &instance.guid(), &instance.slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accounts_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        AccountHandler.create_tables(&store).unwrap();
        AccountHandler.create_tables(&store).unwrap();

        let parent = Uuid::new_v4();
        let mut account = Account::new("Checking", AccountType::Bank, Some(parent));
        account.code = "1010".to_string();
        let instance = Instance::new(Uuid::new_v4(), Entity::Account(account));
        AccountHandler.commit(&store, &instance).unwrap().unwrap();

        let mut book = Book::empty(Uuid::new_v4());
        AccountHandler.initial_load(&store, &mut book).unwrap();
        let loaded = book.get(&instance.guid()).unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.entity(), instance.entity());
    }

    #[test]
    fn destroying_an_account_deletes_its_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        AccountHandler.create_tables(&store).unwrap();
        let mut instance = Instance::new(
            Uuid::new_v4(),
            Entity::Account(Account::new("Cash", AccountType::Cash, None)),
        );
        AccountHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Account").unwrap(), 1);

        instance.set_destroying(true);
        AccountHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Account").unwrap(), 0);
    }
}
