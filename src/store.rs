//! The record store seam.
//!
//! Ingestion and search only talk to storage through [`RecordStore`], so the
//! redb-backed [`RecordDb`](crate::record_db::RecordDb) can be swapped for a
//! wrapper in tests (for example one that fails a write half way through a
//! file).

use chrono::{DateTime, Utc};

use crate::model::{FileHandle, NewRecord, Record, Row};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("record encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// Matches a row when at least one of `fields` contains `needle`,
/// ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyFieldContains {
    pub fields: Vec<String>,
    needle: String,
}

impl AnyFieldContains {
    pub fn new(fields: &[String], needle: &str) -> Self {
        Self {
            fields: fields.iter().map(|f| f.trim().to_string()).collect(),
            needle: needle.to_lowercase(),
        }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.fields.iter().any(|field| {
            row.get(field)
                .is_some_and(|value| value.to_lowercase().contains(&self.needle))
        })
    }
}

/// Records of one file whose rows satisfy every clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub file_id: u64,
    pub clauses: Vec<AnyFieldContains>,
}

impl RecordFilter {
    /// Every record of `file_id`.
    pub fn file(file_id: u64) -> Self {
        Self {
            file_id,
            clauses: Vec::new(),
        }
    }

    pub fn with_clause(mut self, clause: AnyFieldContains) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.file_id == self.file_id
            && self.clauses.iter().all(|c| c.matches(&record.data))
    }
}

pub trait RecordStore: Send + Sync {
    /// Create a handle flagged active, clearing the flag on every other
    /// handle in the same write.
    fn create_file_handle(
        &self,
        filename: &str,
        uploaded_at: DateTime<Utc>,
    ) -> StoreResult<FileHandle>;

    fn get_file_handle(&self, file_id: u64) -> StoreResult<Option<FileHandle>>;

    /// All handles, in id order.
    fn list_file_handles(&self) -> StoreResult<Vec<FileHandle>>;

    fn set_row_count(&self, file_id: u64, row_count: u64) -> StoreResult<()>;

    /// Make `file_id` the only active handle. Returns false if it does not
    /// exist, in which case nothing changes.
    fn set_active_file(&self, file_id: u64) -> StoreResult<bool>;

    fn active_file(&self) -> StoreResult<Option<FileHandle>> {
        Ok(self
            .list_file_handles()?
            .into_iter()
            .find(|handle| handle.is_active))
    }

    /// Delete a handle and all of its records.
    fn delete_file_handle(&self, file_id: u64) -> StoreResult<bool>;

    /// Write a batch of rows in one commit.
    fn insert_many(&self, records: &[NewRecord]) -> StoreResult<()>;

    /// Matching records in insertion order.
    fn filter(&self, filter: &RecordFilter) -> StoreResult<Vec<Record>>;

    fn count(&self, filter: &RecordFilter) -> StoreResult<usize> {
        Ok(self.filter(filter)?.len())
    }

    fn first(&self, filter: &RecordFilter) -> StoreResult<Option<Record>> {
        Ok(self.filter(filter)?.into_iter().next())
    }

    /// Remove every record of a file, returning how many were removed.
    fn delete_by_file(&self, file_id: u64) -> StoreResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;

    fn record(file_id: u64, pairs: &[(&str, &str)]) -> Record {
        Record {
            id: 1,
            file_id,
            data: row(pairs.iter().copied()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn clause_matches_any_field_case_insensitively() {
        let fields = vec!["Product".to_string(), "Company".to_string()];
        let clause = AnyFieldContains::new(&fields, "ACME");
        let rec = record(1, &[("Product", "Widget"), ("Company", "Acme Ltd")]);
        assert!(clause.matches(&rec.data));

        let clause = AnyFieldContains::new(&fields, "gizmo");
        assert!(!clause.matches(&rec.data));
    }

    #[test]
    fn clause_ignores_fields_not_requested() {
        let fields = vec!["Product".to_string()];
        let clause = AnyFieldContains::new(&fields, "acme");
        let rec = record(1, &[("Product", "Widget"), ("Company", "Acme")]);
        assert!(!clause.matches(&rec.data));
    }

    #[test]
    fn clause_trims_field_names() {
        let fields = vec!["  Product ".to_string()];
        let clause = AnyFieldContains::new(&fields, "widg");
        let rec = record(1, &[("Product", "Widget")]);
        assert!(clause.matches(&rec.data));
    }

    #[test]
    fn filter_requires_every_clause_and_the_file() {
        let fields = vec!["Product".to_string(), "Company".to_string()];
        let filter = RecordFilter::file(7)
            .with_clause(AnyFieldContains::new(&fields, "widget"))
            .with_clause(AnyFieldContains::new(&fields, "acme"));

        let both = record(7, &[("Product", "Widget"), ("Company", "Acme")]);
        let one = record(7, &[("Product", "Widget"), ("Company", "Globex")]);
        let other_file = record(8, &[("Product", "Widget"), ("Company", "Acme")]);

        assert!(filter.matches(&both));
        assert!(!filter.matches(&one));
        assert!(!filter.matches(&other_file));
    }
}
