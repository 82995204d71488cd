use std::io::Write;

use indexmap::IndexSet;
use tracing::debug;

use crate::{
    error::Result,
    search::{SearchQuery, matching_records, resolve_file, validate},
    store::{RecordFilter, RecordStore},
};

/// Write every record matching `query` as CSV, ignoring paging.
///
/// The header is the key order of the file's first record followed by any
/// key that only appears in matching records. Missing values are written
/// as empty cells. With no terms only the header is written. Returns the
/// number of data rows written.
pub fn export_delimited(
    store: &dyn RecordStore,
    query: &SearchQuery,
    writer: impl Write,
) -> Result<usize> {
    let (file_id, fields) = validate(query)?;
    resolve_file(store, file_id)?;

    let terms = query.terms();
    let records = if terms.is_empty() {
        Vec::new()
    } else {
        matching_records(store, file_id, &fields, &terms)?
    };

    let mut header: IndexSet<String> = store
        .first(&RecordFilter::file(file_id))?
        .map(|first| first.data.into_keys().collect())
        .unwrap_or_default();
    for record in &records {
        header.extend(record.data.keys().cloned());
    }

    let mut out = csv::Writer::from_writer(writer);
    if !header.is_empty() {
        out.write_record(&header)?;
    }
    for record in &records {
        out.write_record(header.iter().map(|key| {
            record.data.get(key).map(String::as_str).unwrap_or_default()
        }))?;
    }
    out.flush()?;

    debug!(file_id, rows = records.len(), "export finished");
    Ok(records.len())
}
