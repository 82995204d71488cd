use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One normalized row: column header to trimmed cell text, in column order.
pub type Row = IndexMap<String, String>;

/// Metadata for one ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: u64,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub row_count: u64,
    pub is_active: bool,
}

/// A stored row together with its owning file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Insertion sequence number, unique across the store.
    pub id: u64,
    pub file_id: u64,
    pub data: Row,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Look up a field, trimming the requested name the way queries do.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data.get(name.trim()).map(String::as_str)
    }
}

/// A row waiting to be written by `RecordStore::insert_many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub file_id: u64,
    pub data: Row,
}

/// Build a [`Row`] from string pairs. Handy in tests and fixtures.
///
/// # Examples
///
/// ```
/// let row = tabsearch::model::row([("Product", "Widget"), ("Price", "10")]);
/// assert_eq!(row.keys().collect::<Vec<_>>(), ["Product", "Price"]);
/// ```
pub fn row<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
