use bookdb_core::{BackendError, SlotValue, Slots, SLOT_TYPE_TAG};
use bookdb_sqlite::{
    codec::{date_to_str, decimal_to_str, guid_to_str, str_to_date, str_to_decimal, str_to_guid},
    SqliteStore, StoreError,
};
use rusqlite::params;
use uuid::Uuid;

use crate::handler::TypeHandler;

/// Owns the key-value table every other handler writes its slots into.
pub struct SlotHandler;

impl TypeHandler for SlotHandler {
    fn type_tag(&self) -> &str {
        SLOT_TYPE_TAG
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS Slot (
                obj_guid TEXT NOT NULL,
                name TEXT NOT NULL,
                slot_type TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (obj_guid, name)
            );",
        )?;
        Ok(())
    }
}

fn encode(value: &SlotValue) -> String {
    match value {
        SlotValue::Int64(i) => i.to_string(),
        SlotValue::Double(d) => d.to_string(),
        SlotValue::Numeric(n) => decimal_to_str(n),
        SlotValue::String(s) => s.clone(),
        SlotValue::Guid(g) => guid_to_str(g),
        SlotValue::Date(d) => date_to_str(*d),
    }
}

fn decode(slot_type: &str, value: &str) -> Result<SlotValue, StoreError> {
    let v = match slot_type {
        "int64" => SlotValue::Int64(
            value
                .parse()
                .map_err(|_| StoreError::decode("int64 slot", value))?,
        ),
        "double" => SlotValue::Double(
            value
                .parse()
                .map_err(|_| StoreError::decode("double slot", value))?,
        ),
        "numeric" => SlotValue::Numeric(str_to_decimal(value)?),
        "string" => SlotValue::String(value.to_string()),
        "guid" => SlotValue::Guid(str_to_guid(value)?),
        "date" => SlotValue::Date(str_to_date(value)?),
        _ => return Err(StoreError::decode("slot type", slot_type)),
    };
    Ok(v)
}

/// Replace the stored slots of one object.
pub fn save(store: &SqliteStore, guid: &Uuid, slots: &Slots) -> Result<(), BackendError> {
    if !store.table_exists(SLOT_TYPE_TAG)? {
        if slots.is_empty() {
            return Ok(());
        }
        return Err(BackendError::Misconfigured(
            "object has slots but the slot table does not exist".to_string(),
        ));
    }

    let obj = guid_to_str(guid);
    store.execute("DELETE FROM Slot WHERE obj_guid = ?1", params![obj])?;
    for (name, value) in slots {
        store.execute(
            "INSERT INTO Slot (obj_guid, name, slot_type, value) VALUES (?1, ?2, ?3, ?4)",
            params![obj, name, value.type_name(), encode(value)],
        )?;
    }
    Ok(())
}

pub fn load(store: &SqliteStore, guid: &Uuid) -> Result<Slots, BackendError> {
    if !store.table_exists(SLOT_TYPE_TAG)? {
        return Ok(Slots::new());
    }

    let rows: Vec<(String, String, String)> = store.query_rows(
        "SELECT name, slot_type, value FROM Slot WHERE obj_guid = ?1",
        params![guid_to_str(guid)],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let mut slots = Slots::new();
    for (name, slot_type, value) in rows {
        slots.insert(name, decode(&slot_type, &value)?);
    }
    Ok(slots)
}

pub fn delete(store: &SqliteStore, guid: &Uuid) -> Result<(), BackendError> {
    if store.table_exists(SLOT_TYPE_TAG)? {
        store.execute(
            "DELETE FROM Slot WHERE obj_guid = ?1",
            params![guid_to_str(guid)],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use time::{Date, Month};

    use super::*;

    #[test]
    fn slots_round_trip_through_the_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        SlotHandler.create_tables(&store).unwrap();
        let guid = Uuid::new_v4();

        let mut slots = Slots::new();
        slots.insert("notes".into(), SlotValue::String("paid in cash".into()));
        slots.insert("limit".into(), SlotValue::Numeric(dec!(1500.25)));
        slots.insert("count".into(), SlotValue::Int64(-3));
        slots.insert(
            "reviewed".into(),
            SlotValue::Date(Date::from_calendar_date(2024, Month::May, 9).unwrap()),
        );
        save(&store, &guid, &slots).unwrap();
        assert_eq!(load(&store, &guid).unwrap(), slots);

        slots.remove("count");
        save(&store, &guid, &slots).unwrap();
        assert_eq!(load(&store, &guid).unwrap().len(), 3);

        delete(&store, &guid).unwrap();
        assert!(load(&store, &guid).unwrap().is_empty());
    }

    #[test]
    fn missing_table_only_matters_when_there_is_data() {
        let store = SqliteStore::open_in_memory().unwrap();
        let guid = Uuid::new_v4();
        save(&store, &guid, &Slots::new()).unwrap();
        assert!(load(&store, &guid).unwrap().is_empty());

        let mut slots = Slots::new();
        slots.insert("k".into(), SlotValue::Int64(1));
        assert!(save(&store, &guid, &slots).is_err());
    }
}
