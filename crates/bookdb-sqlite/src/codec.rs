//! Text encodings used for columns SQLite has no native type for.

use std::str::FromStr;

use rust_decimal::Decimal;
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

use crate::StoreError;

pub fn date_to_str(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

pub fn str_to_date(s: &str) -> Result<Date, StoreError> {
    let bad = || StoreError::decode("date", s);
    let mut parts = s.splitn(3, '-');
    let year = parts.next().and_then(|p| p.parse::<i32>().ok()).ok_or_else(bad)?;
    let month = parts.next().and_then(|p| p.parse::<u8>().ok()).ok_or_else(bad)?;
    let day = parts
        .next()
        .and_then(|p| p.get(..2))
        .and_then(|p| p.parse::<u8>().ok())
        .ok_or_else(bad)?;
    let month = Month::try_from(month).map_err(|_| bad())?;
    Date::from_calendar_date(year, month, day).map_err(|_| bad())
}

pub fn timestamp_to_datetime(ts: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp(ts).map_err(|_| StoreError::decode("timestamp", ts.to_string()))
}

/// GUIDs are stored as 32 lowercase hex digits without separators.
pub fn guid_to_str(guid: &Uuid) -> String {
    guid.simple().to_string()
}

pub fn str_to_guid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|_| StoreError::decode("guid", s))
}

pub fn opt_str_to_guid(s: Option<String>) -> Result<Option<Uuid>, StoreError> {
    s.filter(|s| !s.is_empty()).map(|s| str_to_guid(&s)).transpose()
}

pub fn decimal_to_str(d: &Decimal) -> String {
    d.to_string()
}

pub fn str_to_decimal(s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s).map_err(|_| StoreError::decode("numeric", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_use_iso_calendar_form() {
        let d = Date::from_calendar_date(2007, Month::February, 3).unwrap();
        assert_eq!(date_to_str(d), "2007-02-03");
        assert_eq!(str_to_date("2007-02-03").unwrap(), d);
        assert_eq!(str_to_date("2007-02-03 10:00:00").unwrap(), d);
        assert!(str_to_date("2007-13-01").is_err());
        assert!(str_to_date("yesterday").is_err());
    }

    #[test]
    fn guids_are_stored_without_hyphens() {
        let guid = Uuid::new_v4();
        let s = guid_to_str(&guid);
        assert_eq!(s.len(), 32);
        assert_eq!(str_to_guid(&s).unwrap(), guid);
        assert_eq!(opt_str_to_guid(Some(String::new())).unwrap(), None);
        assert!(str_to_guid("not-a-guid").is_err());
    }
}
