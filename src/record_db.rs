use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    Table,
    TableDefinition,
    backends::InMemoryBackend,
};
use serde::{Deserialize, Serialize};

use crate::{
    model::{FileHandle, NewRecord, Record, Row},
    store::{RecordFilter, RecordStore, StoreResult},
};

const FILES: TableDefinition<u64, &[u8]> = TableDefinition::new("files");
/// Keyed by (file id, record sequence) so one file is a contiguous range in
/// insertion order.
const RECORDS: TableDefinition<(u64, u64), &[u8]> =
    TableDefinition::new("records");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

const FILE_ID_COUNTER: &str = "file_id";
const RECORD_SEQ_COUNTER: &str = "record_seq";

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    data: Row,
    created_at: DateTime<Utc>,
}

pub struct RecordDb {
    db: Database,
}

impl RecordDb {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// A store that lives only as long as the value. Used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let db =
            Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(FILES)?;
        txn.open_table(RECORDS)?;
        txn.open_table(COUNTERS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> StoreResult<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> StoreResult<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }
}

/// Reserve `count` consecutive ids from a named counter and return the
/// first one. Ids start at 1.
fn allocate_ids(
    counters: &mut Table<'_, &'static str, u64>,
    name: &str,
    count: u64,
) -> StoreResult<u64> {
    let last = counters.get(name)?.map(|v| v.value()).unwrap_or(0);
    counters.insert(name, last + count)?;
    Ok(last + 1)
}

fn read_handles(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> StoreResult<Vec<FileHandle>> {
    let mut handles = Vec::new();
    for entry in table.iter()? {
        let (_id, bytes) = entry?;
        handles.push(serde_json::from_slice(bytes.value())?);
    }
    Ok(handles)
}

fn write_handle(
    table: &mut Table<'_, u64, &'static [u8]>,
    handle: &FileHandle,
) -> StoreResult<()> {
    let bytes = serde_json::to_vec(handle)?;
    table.insert(handle.id, bytes.as_slice())?;
    Ok(())
}

fn decode_record(
    file_id: u64,
    seq: u64,
    bytes: &[u8],
) -> StoreResult<Record> {
    let stored: StoredRecord = serde_json::from_slice(bytes)?;
    Ok(Record {
        id: seq,
        file_id,
        data: stored.data,
        created_at: stored.created_at,
    })
}

impl RecordStore for RecordDb {
    fn create_file_handle(
        &self,
        filename: &str,
        uploaded_at: DateTime<Utc>,
    ) -> StoreResult<FileHandle> {
        let txn = self.db.begin_write()?;
        let handle = {
            let mut counters = txn.open_table(COUNTERS)?;
            let id = allocate_ids(&mut counters, FILE_ID_COUNTER, 1)?;

            let mut files = txn.open_table(FILES)?;
            for mut previous in read_handles(&files)? {
                if previous.is_active {
                    previous.is_active = false;
                    write_handle(&mut files, &previous)?;
                }
            }

            let handle = FileHandle {
                id,
                filename: filename.to_string(),
                uploaded_at,
                row_count: 0,
                is_active: true,
            };
            write_handle(&mut files, &handle)?;
            handle
        };
        txn.commit()?;
        Ok(handle)
    }

    fn get_file_handle(&self, file_id: u64) -> StoreResult<Option<FileHandle>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        match table.get(file_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn list_file_handles(&self) -> StoreResult<Vec<FileHandle>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        read_handles(&table)
    }

    fn set_row_count(&self, file_id: u64, row_count: u64) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut files = txn.open_table(FILES)?;
            let existing: Option<FileHandle> = match files.get(file_id)? {
                Some(bytes) => Some(serde_json::from_slice(bytes.value())?),
                None => None,
            };
            if let Some(mut handle) = existing {
                handle.row_count = row_count;
                write_handle(&mut files, &handle)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn set_active_file(&self, file_id: u64) -> StoreResult<bool> {
        let txn = self.db.begin_write()?;
        let found = {
            let mut files = txn.open_table(FILES)?;
            let handles = read_handles(&files)?;
            let found = handles.iter().any(|h| h.id == file_id);
            if found {
                for mut handle in handles {
                    let should_be_active = handle.id == file_id;
                    if handle.is_active != should_be_active {
                        handle.is_active = should_be_active;
                        write_handle(&mut files, &handle)?;
                    }
                }
            }
            found
        };
        txn.commit()?;
        Ok(found)
    }

    fn delete_file_handle(&self, file_id: u64) -> StoreResult<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut records = txn.open_table(RECORDS)?;
            let keys = record_keys(&records, file_id)?;
            for key in keys {
                records.remove(key)?;
            }
            let mut files = txn.open_table(FILES)?;
            files.remove(file_id)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn insert_many(&self, records: &[NewRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let created_at = Utc::now();
        let txn = self.db.begin_write()?;
        {
            let mut counters = txn.open_table(COUNTERS)?;
            let first_seq = allocate_ids(
                &mut counters,
                RECORD_SEQ_COUNTER,
                records.len() as u64,
            )?;

            let mut table = txn.open_table(RECORDS)?;
            for (offset, record) in records.iter().enumerate() {
                let stored = StoredRecord {
                    data: record.data.clone(),
                    created_at,
                };
                let bytes = serde_json::to_vec(&stored)?;
                let seq = first_seq + offset as u64;
                table.insert((record.file_id, seq), bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn filter(&self, filter: &RecordFilter) -> StoreResult<Vec<Record>> {
        let mut matches = Vec::new();
        self.scan_file(filter.file_id, |record| {
            if filter.matches(&record) {
                matches.push(record);
            }
            true
        })?;
        Ok(matches)
    }

    fn count(&self, filter: &RecordFilter) -> StoreResult<usize> {
        let mut count = 0;
        self.scan_file(filter.file_id, |record| {
            if filter.matches(&record) {
                count += 1;
            }
            true
        })?;
        Ok(count)
    }

    fn first(&self, filter: &RecordFilter) -> StoreResult<Option<Record>> {
        let mut found = None;
        self.scan_file(filter.file_id, |record| {
            if filter.matches(&record) {
                found = Some(record);
                return false;
            }
            true
        })?;
        Ok(found)
    }

    fn delete_by_file(&self, file_id: u64) -> StoreResult<usize> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut records = txn.open_table(RECORDS)?;
            let keys = record_keys(&records, file_id)?;
            for key in &keys {
                records.remove(*key)?;
            }
            keys.len()
        };
        txn.commit()?;
        Ok(removed)
    }
}

impl RecordDb {
    /// Visit the records of one file in insertion order until `visit`
    /// returns false.
    fn scan_file(
        &self,
        file_id: u64,
        mut visit: impl FnMut(Record) -> bool,
    ) -> StoreResult<()> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        for entry in table.range((file_id, 0)..=(file_id, u64::MAX))? {
            let (key, bytes) = entry?;
            let (owner, seq) = key.value();
            if !visit(decode_record(owner, seq, bytes.value())?) {
                break;
            }
        }
        Ok(())
    }
}

fn record_keys(
    table: &impl ReadableTable<(u64, u64), &'static [u8]>,
    file_id: u64,
) -> StoreResult<Vec<(u64, u64)>> {
    let mut keys = Vec::new();
    for entry in table.range((file_id, 0)..=(file_id, u64::MAX))? {
        let (key, _) = entry?;
        keys.push(key.value());
    }
    Ok(keys)
}

impl std::fmt::Debug for RecordDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::row, store::AnyFieldContains};

    fn test_db() -> (tempfile::TempDir, RecordDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = RecordDb::open(&tmp.path().join("records.redb")).unwrap();
        (tmp, db)
    }

    fn new_record(file_id: u64, product: &str) -> NewRecord {
        NewRecord {
            file_id,
            data: row([("Product", product)]),
        }
    }

    #[test]
    fn file_handles_crud() {
        let db = RecordDb::open_in_memory().unwrap();

        assert!(db.list_file_handles().unwrap().is_empty());
        assert_eq!(db.get_file_handle(1).unwrap(), None);

        let handle = db.create_file_handle("a.csv", Utc::now()).unwrap();
        assert_eq!(handle.id, 1);
        assert!(handle.is_active);
        assert_eq!(handle.row_count, 0);

        db.set_row_count(handle.id, 42).unwrap();
        let stored = db.get_file_handle(handle.id).unwrap().unwrap();
        assert_eq!(stored.row_count, 42);
        assert_eq!(stored.filename, "a.csv");

        assert!(db.delete_file_handle(handle.id).unwrap());
        assert!(!db.delete_file_handle(handle.id).unwrap());
        assert_eq!(db.get_file_handle(handle.id).unwrap(), None);
    }

    #[test]
    fn creating_a_handle_deactivates_the_others() {
        let db = RecordDb::open_in_memory().unwrap();
        let first = db.create_file_handle("a.csv", Utc::now()).unwrap();
        let second = db.create_file_handle("b.csv", Utc::now()).unwrap();

        let active: Vec<_> = db
            .list_file_handles()
            .unwrap()
            .into_iter()
            .filter(|h| h.is_active)
            .map(|h| h.id)
            .collect();
        assert_eq!(active, vec![second.id]);
        assert_eq!(db.active_file().unwrap().unwrap().id, second.id);

        assert!(db.set_active_file(first.id).unwrap());
        assert_eq!(db.active_file().unwrap().unwrap().id, first.id);
        let second = db.get_file_handle(second.id).unwrap().unwrap();
        assert!(!second.is_active);
    }

    #[test]
    fn set_active_unknown_file_changes_nothing() {
        let db = RecordDb::open_in_memory().unwrap();
        let handle = db.create_file_handle("a.csv", Utc::now()).unwrap();

        assert!(!db.set_active_file(99).unwrap());
        assert_eq!(db.active_file().unwrap().unwrap().id, handle.id);
    }

    #[test]
    fn records_come_back_in_insertion_order_per_file() {
        let db = RecordDb::open_in_memory().unwrap();
        db.insert_many(&[new_record(1, "b"), new_record(2, "x")])
            .unwrap();
        db.insert_many(&[new_record(1, "a"), new_record(1, "c")])
            .unwrap();

        let products: Vec<_> = db
            .filter(&RecordFilter::file(1))
            .unwrap()
            .into_iter()
            .map(|r| r.data["Product"].clone())
            .collect();
        assert_eq!(products, vec!["b", "a", "c"]);
        assert_eq!(db.count(&RecordFilter::file(2)).unwrap(), 1);
    }

    #[test]
    fn filter_count_and_first_apply_clauses() {
        let db = RecordDb::open_in_memory().unwrap();
        db.insert_many(&[
            new_record(1, "Blue Widget"),
            new_record(1, "Gadget"),
            new_record(1, "widget stand"),
        ])
        .unwrap();

        let fields = vec!["Product".to_string()];
        let filter = RecordFilter::file(1)
            .with_clause(AnyFieldContains::new(&fields, "WIDGET"));

        assert_eq!(db.count(&filter).unwrap(), 2);
        let first = db.first(&filter).unwrap().unwrap();
        assert_eq!(first.data["Product"], "Blue Widget");
        assert_eq!(first.file_id, 1);
    }

    #[test]
    fn delete_by_file_leaves_other_files_alone() {
        let db = RecordDb::open_in_memory().unwrap();
        db.insert_many(&[
            new_record(1, "a"),
            new_record(2, "b"),
            new_record(1, "c"),
        ])
        .unwrap();

        assert_eq!(db.delete_by_file(1).unwrap(), 2);
        assert_eq!(db.count(&RecordFilter::file(1)).unwrap(), 0);
        assert_eq!(db.count(&RecordFilter::file(2)).unwrap(), 1);
    }

    #[test]
    fn deleting_a_handle_cascades_to_its_records() {
        let db = RecordDb::open_in_memory().unwrap();
        let a = db.create_file_handle("a.csv", Utc::now()).unwrap();
        let b = db.create_file_handle("b.csv", Utc::now()).unwrap();
        db.insert_many(&[new_record(a.id, "x"), new_record(b.id, "y")])
            .unwrap();

        assert!(db.delete_file_handle(a.id).unwrap());
        assert_eq!(db.count(&RecordFilter::file(a.id)).unwrap(), 0);
        assert_eq!(db.count(&RecordFilter::file(b.id)).unwrap(), 1);
    }

    #[test]
    fn record_ids_are_unique_across_batches() {
        let db = RecordDb::open_in_memory().unwrap();
        db.insert_many(&[new_record(1, "a"), new_record(1, "b")])
            .unwrap();
        db.insert_many(&[new_record(1, "c")]).unwrap();

        let ids: Vec<_> = db
            .filter(&RecordFilter::file(1))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn settings_crud() {
        let (_tmp, db) = test_db();

        assert_eq!(db.get_setting("batch_size").unwrap(), None);
        db.set_setting("batch_size", "500").unwrap();
        assert_eq!(
            db.get_setting("batch_size").unwrap(),
            Some("500".to_string())
        );
        assert_eq!(db.list_settings().unwrap().len(), 1);

        assert!(db.remove_setting("batch_size").unwrap());
        assert!(!db.remove_setting("batch_size").unwrap());
        assert_eq!(db.get_setting("batch_size").unwrap(), None);
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("records.redb");

        {
            let db = RecordDb::open(&path).unwrap();
            let handle = db.create_file_handle("a.csv", Utc::now()).unwrap();
            db.insert_many(&[new_record(handle.id, "Widget")]).unwrap();
        }

        {
            let db = RecordDb::open(&path).unwrap();
            let handles = db.list_file_handles().unwrap();
            assert_eq!(handles.len(), 1);
            assert_eq!(db.count(&RecordFilter::file(handles[0].id)).unwrap(), 1);

            // Counters survive too, so ids keep increasing.
            let next = db.create_file_handle("b.csv", Utc::now()).unwrap();
            assert_eq!(next.id, 2);
        }
    }
}
