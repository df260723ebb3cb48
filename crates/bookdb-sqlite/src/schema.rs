use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Snapshot of the tables and columns present in a store. It goes stale as
/// soon as DDL runs and has to be re-read explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaInfo {
    tables: BTreeMap<String, Vec<ColumnInfo>>,
}

impl SchemaInfo {
    pub fn new(tables: BTreeMap<String, Vec<ColumnInfo>>) -> Self {
        Self { tables }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn columns(&self, table: &str) -> Option<&[ColumnInfo]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .map(|cols| cols.iter().any(|c| c.name == column))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
