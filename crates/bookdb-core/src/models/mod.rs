use std::{collections::BTreeMap, fmt::Display};

use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub mod book;

/// Type tag under which the key-value slot table is registered. Slots are
/// not instances of their own; they ride along with their owning object.
pub const SLOT_TYPE_TAG: &str = "Slot";

/// The persistable object kinds. The type tag doubles as the table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Book,
    Commodity,
    Account,
    Transaction,
    Price,
    Budget,
    ScheduledTransaction,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Book,
        ObjectKind::Commodity,
        ObjectKind::Account,
        ObjectKind::Transaction,
        ObjectKind::Price,
        ObjectKind::Budget,
        ObjectKind::ScheduledTransaction,
    ];

    pub fn type_tag(&self) -> &'static str {
        match self {
            ObjectKind::Book => "Book",
            ObjectKind::Commodity => "Commodity",
            ObjectKind::Account => "Account",
            ObjectKind::Transaction => "Trans",
            ObjectKind::Price => "Price",
            ObjectKind::Budget => "Budget",
            ObjectKind::ScheduledTransaction => "SchedXaction",
        }
    }

    pub fn from_type_tag(tag: &str) -> Option<ObjectKind> {
        ObjectKind::ALL.iter().copied().find(|k| k.type_tag() == tag)
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Root,
    Bank,
    Cash,
    Asset,
    Credit,
    Liability,
    Stock,
    Mutual,
    Currency,
    Income,
    Expense,
    Equity,
    Receivable,
    Payable,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Root => "ROOT",
            AccountType::Bank => "BANK",
            AccountType::Cash => "CASH",
            AccountType::Asset => "ASSET",
            AccountType::Credit => "CREDIT",
            AccountType::Liability => "LIABILITY",
            AccountType::Stock => "STOCK",
            AccountType::Mutual => "MUTUAL",
            AccountType::Currency => "CURRENCY",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
            AccountType::Equity => "EQUITY",
            AccountType::Receivable => "RECEIVABLE",
            AccountType::Payable => "PAYABLE",
        }
    }

    pub fn parse(s: &str) -> Option<AccountType> {
        let t = match s {
            "ROOT" => AccountType::Root,
            "BANK" => AccountType::Bank,
            "CASH" => AccountType::Cash,
            "ASSET" => AccountType::Asset,
            "CREDIT" => AccountType::Credit,
            "LIABILITY" => AccountType::Liability,
            "STOCK" => AccountType::Stock,
            "MUTUAL" => AccountType::Mutual,
            "CURRENCY" => AccountType::Currency,
            "INCOME" => AccountType::Income,
            "EXPENSE" => AccountType::Expense,
            "EQUITY" => AccountType::Equity,
            "RECEIVABLE" => AccountType::Receivable,
            "PAYABLE" => AccountType::Payable,
            _ => return None,
        };
        Some(t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    pub root_account: Uuid,
    pub template_root: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Commodity {
    pub namespace: String,
    pub mnemonic: String,
    pub fullname: String,
    pub fraction: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub name: String,
    pub account_type: AccountType,
    pub commodity: Option<Uuid>,
    pub parent: Option<Uuid>,
    pub code: String,
    pub description: String,
}

impl Account {
    pub fn new(name: &str, account_type: AccountType, parent: Option<Uuid>) -> Self {
        Self {
            name: name.to_string(),
            account_type,
            commodity: None,
            parent,
            code: String::new(),
            description: String::new(),
        }
    }
}

/// One line item of a transaction. Splits are stored in their own table but
/// are owned by, and committed through, their transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub guid: Uuid,
    pub account: Uuid,
    pub memo: String,
    pub reconcile: char,
    pub value: Decimal,
    pub quantity: Decimal,
}

impl Split {
    pub fn new(account: Uuid, value: Decimal) -> Self {
        Self {
            guid: Uuid::new_v4(),
            account,
            memo: String::new(),
            reconcile: 'n',
            value,
            quantity: value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub currency: Option<Uuid>,
    pub num: String,
    pub post_date: Date,
    pub enter_date: OffsetDateTime,
    pub description: String,
    pub splits: Vec<Split>,
}

impl Transaction {
    pub fn new(post_date: Date, description: &str, splits: Vec<Split>) -> Self {
        // Entry times are kept at whole-second precision, as stored.
        let now = OffsetDateTime::now_utc();
        Self {
            currency: None,
            num: String::new(),
            post_date,
            enter_date: OffsetDateTime::from_unix_timestamp(now.unix_timestamp()).unwrap_or(now),
            description: description.to_string(),
            splits,
        }
    }

    pub fn touches_account(&self, account: &Uuid) -> bool {
        self.splits.iter().any(|s| &s.account == account)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub commodity: Uuid,
    pub currency: Uuid,
    pub date: Date,
    pub source: String,
    pub price_type: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub name: String,
    pub description: String,
    pub num_periods: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTransaction {
    pub name: String,
    pub enabled: bool,
    pub start_date: Date,
    pub last_occur: Option<Date>,
    pub num_occurrences: i32,
    pub template_account: Option<Uuid>,
    /// When the transaction recurs. An empty schedule never fires.
    pub schedule: Vec<Recurrence>,
}

/// Unit of a recurrence period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Once,
    Day,
    Week,
    Month,
    EndOfMonth,
    NthWeekday,
    LastWeekday,
    Year,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Once => "once",
            PeriodType::Day => "day",
            PeriodType::Week => "week",
            PeriodType::Month => "month",
            PeriodType::EndOfMonth => "end of month",
            PeriodType::NthWeekday => "nth weekday",
            PeriodType::LastWeekday => "last weekday",
            PeriodType::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<PeriodType> {
        let t = match s {
            "once" => PeriodType::Once,
            "day" => PeriodType::Day,
            "week" => PeriodType::Week,
            "month" => PeriodType::Month,
            "end of month" => PeriodType::EndOfMonth,
            "nth weekday" => PeriodType::NthWeekday,
            "last weekday" => PeriodType::LastWeekday,
            "year" => PeriodType::Year,
            _ => return None,
        };
        Some(t)
    }
}

/// Every `multiplier` periods, counted from `period_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct Recurrence {
    pub multiplier: u32,
    pub period: PeriodType,
    pub period_start: Date,
}

impl Recurrence {
    pub fn new(multiplier: u32, period: PeriodType, period_start: Date) -> Self {
        Self {
            multiplier,
            period,
            period_start,
        }
    }
}

/// The payload of a persisted instance. Its variant decides the object kind
/// and therefore which handler receives it.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Book(BookRecord),
    Commodity(Commodity),
    Account(Account),
    Transaction(Transaction),
    Price(Price),
    Budget(Budget),
    ScheduledTransaction(ScheduledTransaction),
}

impl Entity {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Entity::Book(_) => ObjectKind::Book,
            Entity::Commodity(_) => ObjectKind::Commodity,
            Entity::Account(_) => ObjectKind::Account,
            Entity::Transaction(_) => ObjectKind::Transaction,
            Entity::Price(_) => ObjectKind::Price,
            Entity::Budget(_) => ObjectKind::Budget,
            Entity::ScheduledTransaction(_) => ObjectKind::ScheduledTransaction,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Int64(i64),
    Double(f64),
    Numeric(Decimal),
    String(String),
    Guid(Uuid),
    Date(Date),
}

impl SlotValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SlotValue::Int64(_) => "int64",
            SlotValue::Double(_) => "double",
            SlotValue::Numeric(_) => "numeric",
            SlotValue::String(_) => "string",
            SlotValue::Guid(_) => "guid",
            SlotValue::Date(_) => "date",
        }
    }
}

/// Key-value frame attached to an instance.
pub type Slots = BTreeMap<String, SlotValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_round_trip_for_every_kind() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_type_tag(kind.type_tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_type_tag("Lot"), None);
        assert_eq!(ObjectKind::Transaction.to_string(), "Trans");
    }

    #[test]
    fn unknown_account_type_is_rejected() {
        assert_eq!(AccountType::parse("BANK"), Some(AccountType::Bank));
        assert_eq!(AccountType::parse("bank"), None);
    }

    #[test]
    fn period_type_names_are_stable() {
        assert_eq!(PeriodType::EndOfMonth.as_str(), "end of month");
        assert_eq!(PeriodType::parse("nth weekday"), Some(PeriodType::NthWeekday));
        assert_eq!(PeriodType::parse("fortnight"), None);
    }
}
