//! File-level operations: listing, selecting and deleting ingested files,
//! and discovering their columns.

use serde::Serialize;
use tracing::info;

use crate::{
    error::{Error, Result},
    model::FileHandle,
    progress::{IngestionStatus, ProgressTracker},
    search::resolve_file,
    store::{RecordFilter, RecordStore},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnsInfo {
    pub columns: Vec<String>,
    pub current_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    pub file_id: u64,
    pub filename: String,
    pub columns: Vec<String>,
}

/// Every file, newest upload first.
pub fn list_files(store: &dyn RecordStore) -> Result<Vec<FileHandle>> {
    let mut files = store.list_file_handles()?;
    files.sort_by(|a, b| {
        b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id))
    });
    Ok(files)
}

/// Make `file_id` the only active file.
pub fn select_file(
    store: &dyn RecordStore,
    file_id: u64,
) -> Result<SelectedFile> {
    let handle = resolve_file(store, file_id)?;
    if !store.set_active_file(file_id)? {
        return Err(Error::FileNotFound(file_id));
    }
    info!(file_id, filename = %handle.filename, "selected file");

    Ok(SelectedFile {
        file_id,
        filename: handle.filename,
        columns: first_record_columns(store, file_id)?,
    })
}

/// Remove a file's records, then the file itself.
pub fn delete_file(store: &dyn RecordStore, file_id: u64) -> Result<FileHandle> {
    let handle = resolve_file(store, file_id)?;
    let removed = store.delete_by_file(file_id)?;
    store.delete_file_handle(file_id)?;
    info!(file_id, records = removed, "deleted file");
    Ok(handle)
}

/// Keys of the file's first record, or nothing for an empty file.
pub fn first_record_columns(
    store: &dyn RecordStore,
    file_id: u64,
) -> Result<Vec<String>> {
    Ok(store
        .first(&RecordFilter::file(file_id))?
        .map(|record| record.data.into_keys().collect())
        .unwrap_or_default())
}

/// Columns available for searching.
///
/// With an explicit file id these are the keys of that file's first
/// record. Without one, the columns of a running or just-finished
/// ingestion win, then the active file's, then nothing.
pub fn columns(
    store: &dyn RecordStore,
    progress: &ProgressTracker,
    file_id: Option<u64>,
) -> Result<ColumnsInfo> {
    if let Some(id) = file_id {
        let handle = resolve_file(store, id)?;
        return Ok(ColumnsInfo {
            columns: first_record_columns(store, id)?,
            current_file: Some(handle.filename),
        });
    }

    let snapshot = progress.get();
    if matches!(
        snapshot.status,
        IngestionStatus::InProgress | IngestionStatus::Completed
    ) && !snapshot.columns.is_empty()
    {
        return Ok(ColumnsInfo {
            columns: snapshot.columns,
            current_file: snapshot.current_file,
        });
    }

    if let Some(active) = store.active_file()? {
        let columns = first_record_columns(store, active.id)?;
        if !columns.is_empty() {
            return Ok(ColumnsInfo {
                columns,
                current_file: Some(active.filename),
            });
        }
    }

    Ok(ColumnsInfo {
        columns: Vec::new(),
        current_file: None,
    })
}

/// The explicit file id if given, else the active file's.
pub fn target_file(
    store: &dyn RecordStore,
    file_id: Option<u64>,
) -> Result<Option<u64>> {
    match file_id {
        Some(id) => Ok(Some(id)),
        None => Ok(store.active_file()?.map(|handle| handle.id)),
    }
}
