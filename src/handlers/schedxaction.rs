use bookdb_core::{
    BackendError, Book, Entity, Instance, ObjectKind, PeriodType, Recurrence, ScheduledTransaction,
};
use bookdb_sqlite::{
    codec::{date_to_str, guid_to_str, opt_str_to_guid, str_to_date, str_to_guid},
    SqliteStore, StoreError,
};
use rusqlite::params;
use uuid::Uuid;

use super::{delete_object, generic_sql, slots, wrong_kind};
use crate::{handler::TypeHandler, query::CompiledQuery};

pub struct SchedXactionHandler;

struct SchedXactionRow {
    guid: String,
    name: String,
    enabled: bool,
    start_date: String,
    last_occur: Option<String>,
    num_occur: i32,
    template_account: Option<String>,
}

impl SchedXactionRow {
    fn into_instance(self, schedule: Vec<Recurrence>) -> Result<Instance, StoreError> {
        let sx = ScheduledTransaction {
            name: self.name,
            enabled: self.enabled,
            start_date: str_to_date(&self.start_date)?,
            last_occur: self.last_occur.as_deref().map(str_to_date).transpose()?,
            num_occurrences: self.num_occur,
            template_account: opt_str_to_guid(self.template_account)?,
            schedule,
        };
        Ok(Instance::loaded(
            str_to_guid(&self.guid)?,
            Entity::ScheduledTransaction(sx),
        ))
    }
}

impl SchedXactionHandler {
    fn load(&self, store: &SqliteStore, book: &mut Book, sql: &str) -> Result<Vec<Uuid>, BackendError> {
        let rows = store.query_rows(sql, [], |row| {
            Ok(SchedXactionRow {
                guid: row.get("guid")?,
                name: row.get("name")?,
                enabled: row.get("enabled")?,
                start_date: row.get("start_date")?,
                last_occur: row.get("last_occur")?,
                num_occur: row.get("num_occur")?,
                template_account: row.get("template_act_guid")?,
            })
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in rows {
            let schedule = load_schedule(store, &row.guid)?;
            let mut instance = row.into_instance(schedule)?;
            let guid = instance.guid();
            instance.slots = slots::load(store, &guid)?;
            book.insert_loaded(instance);
            loaded.push(guid);
        }
        Ok(loaded)
    }
}

impl TypeHandler for SchedXactionHandler {
    fn type_tag(&self) -> &str {
        ObjectKind::ScheduledTransaction.type_tag()
    }

    fn create_tables(&self, store: &SqliteStore) -> Result<(), BackendError> {
        store.execute_batch(
            "CREATE TABLE IF NOT EXISTS SchedXaction (
                guid TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                last_occur TEXT,
                num_occur INTEGER NOT NULL,
                template_act_guid TEXT
            );
            CREATE TABLE IF NOT EXISTS Recurrence (
                obj_guid TEXT NOT NULL,
                recurrence_mult INTEGER NOT NULL,
                recurrence_period_type TEXT NOT NULL,
                recurrence_period_start TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS recurrence_obj_guid ON Recurrence (obj_guid);",
        )?;
        Ok(())
    }

    fn initial_load(&self, store: &SqliteStore, book: &mut Book) -> Result<(), BackendError> {
        let loaded = self.load(store, book, "SELECT * FROM SchedXaction")?;
        tracing::debug!(count = loaded.len(), "scheduled transactions loaded");
        Ok(())
    }

    fn commit(&self, store: &SqliteStore, instance: &Instance) -> Option<Result<(), BackendError>> {
        let Entity::ScheduledTransaction(sx) = instance.entity() else {
            return Some(Err(wrong_kind(self.type_tag(), instance)));
        };
        Some(save(store, instance, sx))
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

fn load_schedule(store: &SqliteStore, sx_guid: &str) -> Result<Vec<Recurrence>, StoreError> {
    let rows: Vec<(u32, String, String)> = store.query_rows(
        "SELECT recurrence_mult, recurrence_period_type, recurrence_period_start
         FROM Recurrence WHERE obj_guid = ?1 ORDER BY rowid",
        params![sx_guid],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    rows.into_iter()
        .map(|(multiplier, period, start)| {
            let period = PeriodType::parse(&period)
                .ok_or_else(|| StoreError::decode("recurrence_period_type", period))?;
            Ok(Recurrence::new(multiplier, period, str_to_date(&start)?))
        })
        .collect()
}

/// Make the stored recurrences of a scheduled transaction match `schedule`.
fn save_schedule(store: &SqliteStore, sx_guid: &str, schedule: &[Recurrence]) -> Result<(), StoreError> {
    store.execute("DELETE FROM Recurrence WHERE obj_guid = ?1", params![sx_guid])?;
    for recurrence in schedule {
        store.execute(
            "INSERT INTO Recurrence
                (obj_guid, recurrence_mult, recurrence_period_type, recurrence_period_start)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                sx_guid,
                recurrence.multiplier,
                recurrence.period.as_str(),
                date_to_str(recurrence.period_start),
            ],
        )?;
    }
    Ok(())
}

fn save(
    store: &SqliteStore,
    instance: &Instance,
    sx: &ScheduledTransaction,
) -> Result<(), BackendError> {
    let guid = guid_to_str(&instance.guid());
    if instance.is_destroying() {
        store.execute("DELETE FROM Recurrence WHERE obj_guid = ?1", params![guid])?;
        return delete_object(store, "SchedXaction", instance);
    }
    store.execute(
        "INSERT OR REPLACE INTO SchedXaction
            (guid, name, enabled, start_date, last_occur, num_occur, template_act_guid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            guid,
            sx.name,
            sx.enabled,
            date_to_str(sx.start_date),
            sx.last_occur.map(date_to_str),
            sx.num_occurrences,
            sx.template_account.as_ref().map(guid_to_str),
        ],
    )?;
    save_schedule(store, &guid, &sx.schedule)?;
    slots::save(store, &instance.guid(), &instance.slots)
}

#[cfg(test)]
mod tests {
    use time::{Date, Month};

    use super::*;

    #[test]
    fn optional_columns_survive_a_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        SchedXactionHandler.create_tables(&store).unwrap();

        let sx = ScheduledTransaction {
            name: "Rent".to_string(),
            enabled: true,
            start_date: Date::from_calendar_date(2024, Month::February, 1).unwrap(),
            last_occur: None,
            num_occurrences: -1,
            template_account: Some(Uuid::new_v4()),
            schedule: Vec::new(),
        };
        let instance = Instance::new(Uuid::new_v4(), Entity::ScheduledTransaction(sx));
        SchedXactionHandler.commit(&store, &instance).unwrap().unwrap();

        let mut book = Book::empty(Uuid::new_v4());
        SchedXactionHandler.initial_load(&store, &mut book).unwrap();
        assert_eq!(book.get(&instance.guid()).unwrap().entity(), instance.entity());
    }

    #[test]
    fn schedule_is_replaced_on_commit_and_removed_on_destroy() {
        let store = SqliteStore::open_in_memory().unwrap();
        SchedXactionHandler.create_tables(&store).unwrap();

        let start = Date::from_calendar_date(2024, Month::January, 31).unwrap();
        let mut sx = ScheduledTransaction {
            name: "Payday".to_string(),
            enabled: true,
            start_date: start,
            last_occur: Some(start),
            num_occurrences: 0,
            template_account: None,
            schedule: vec![
                Recurrence::new(1, PeriodType::EndOfMonth, start),
                Recurrence::new(2, PeriodType::Week, start),
            ],
        };
        let guid = Uuid::new_v4();
        let instance = Instance::new(guid, Entity::ScheduledTransaction(sx.clone()));
        SchedXactionHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Recurrence").unwrap(), 2);

        let mut book = Book::empty(Uuid::new_v4());
        SchedXactionHandler.initial_load(&store, &mut book).unwrap();
        assert_eq!(book.get(&guid).unwrap().entity(), instance.entity());

        sx.schedule.truncate(1);
        let mut instance = Instance::new(guid, Entity::ScheduledTransaction(sx));
        SchedXactionHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("Recurrence").unwrap(), 1);

        instance.set_destroying(true);
        SchedXactionHandler.commit(&store, &instance).unwrap().unwrap();
        assert_eq!(store.count_rows("SchedXaction").unwrap(), 0);
        assert_eq!(store.count_rows("Recurrence").unwrap(), 0);
    }

    #[test]
    fn unknown_period_type_fails_the_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        SchedXactionHandler.create_tables(&store).unwrap();
        let guid = guid_to_str(&Uuid::new_v4());
        store
            .execute(
                "INSERT INTO SchedXaction (guid, name, enabled, start_date, num_occur)
                 VALUES (?1, 'Odd', 1, '2024-01-01', 0)",
                params![guid],
            )
            .unwrap();
        store
            .execute(
                "INSERT INTO Recurrence VALUES (?1, 1, 'fortnight', '2024-01-01')",
                params![guid],
            )
            .unwrap();

        let mut book = Book::empty(Uuid::new_v4());
        let err = SchedXactionHandler.initial_load(&store, &mut book).unwrap_err();
        assert!(matches!(err, BackendError::Storage(_)));
        assert!(book.is_empty());
    }
}
