//! Header-first, row-by-row readers for the supported formats.
//!
//! Both readers produce the same shape: a list of column names, a
//! pre-computed row total for progress reporting, and an iterator of
//! normalized [`Row`]s. Normalization is shared:
//!
//! - cells are matched to headers by position,
//! - keys and values are trimmed,
//! - cells under a blank header, and empty XLSX cells, are dropped,
//! - a row with no values left (or only empty ones) is skipped.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};

use crate::{
    error::{Error, Result},
    format::SourceFormat,
    model::Row,
};

/// A parsed file ready to be streamed into the store.
pub struct TabularSource {
    pub columns: Vec<String>,
    /// Data rows in the source, counted before any row is produced.
    /// Includes rows that normalization later skips.
    pub total_rows: u64,
    rows: RowSource,
}

impl TabularSource {
    pub fn open(format: SourceFormat, bytes: Vec<u8>) -> Result<Self> {
        match format {
            SourceFormat::Csv => Self::csv(bytes),
            SourceFormat::Xlsx => Self::xlsx(bytes),
        }
    }

    pub fn csv(bytes: Vec<u8>) -> Result<Self> {
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::Parse(format!("file is not valid UTF-8: {e}")))?;

        let header_line = text.split('\n').next().unwrap_or_default();
        let delimiter = detect_delimiter(header_line);
        let total_rows = text.lines().count().saturating_sub(1) as u64;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(Cursor::new(text.into_bytes()));

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::Parse(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            columns: non_empty(&headers),
            total_rows,
            rows: RowSource::Csv {
                records: reader.into_records(),
                headers,
            },
        })
    }

    /// Reads the first worksheet cell by cell. Sheet row 1 is the header
    /// even when it is blank, and only non-empty cells are kept, so memory
    /// follows the cells present rather than the sheet's bounding box.
    pub fn xlsx(bytes: Vec<u8>) -> Result<Self> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| Error::Parse(e.to_string()))?;
        let sheet = workbook
            .sheet_names()
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse("workbook has no worksheets".into()))?;
        let mut reader = workbook
            .worksheet_cells_reader(&sheet)
            .map_err(|e| Error::Parse(e.to_string()))?;

        let mut sheet_rows = SheetRows::default();
        let mut pending: Option<(u32, Vec<(usize, String)>)> = None;

        while let Some(cell) = reader
            .next_cell()
            .map_err(|e| Error::Parse(e.to_string()))?
        {
            let (row, col) = cell.get_position();
            sheet_rows.last_row = sheet_rows.last_row.max(row);
            let Some(text) = cell_text(&Data::from(cell.get_value().clone()))
            else {
                continue;
            };

            match pending.take() {
                Some((r, cells)) if r != row => sheet_rows.push(r, cells),
                other => pending = other,
            }
            pending
                .get_or_insert_with(|| (row, Vec::new()))
                .1
                .push((col as usize, text));
        }
        if let Some((r, cells)) = pending {
            sheet_rows.push(r, cells);
        }

        Ok(Self {
            columns: non_empty(&sheet_rows.headers),
            total_rows: u64::from(sheet_rows.last_row),
            rows: RowSource::Xlsx(sheet_rows.rows.into_iter()),
        })
    }
}

/// Sparse sheet rows collected in row order. Row index 0 is the header.
#[derive(Default)]
struct SheetRows {
    headers: Vec<String>,
    rows: Vec<Row>,
    last_row: u32,
}

impl SheetRows {
    fn push(&mut self, index: u32, cells: Vec<(usize, String)>) {
        if index == 0 {
            let width = cells.iter().map(|(col, _)| col + 1).max().unwrap_or(0);
            self.headers = vec![String::new(); width];
            for (col, text) in cells {
                self.headers[col] = text.trim().to_string();
            }
            return;
        }

        let mut dense = vec![None; self.headers.len()];
        for (col, text) in cells {
            if let Some(slot) = dense.get_mut(col) {
                *slot = Some(text);
            }
        }
        if let Some(row) = normalize_row(&self.headers, dense.into_iter()) {
            self.rows.push(row);
        }
    }
}

impl Iterator for TabularSource {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

enum RowSource {
    Csv {
        records: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
        headers: Vec<String>,
    },
    Xlsx(std::vec::IntoIter<Row>),
}

impl Iterator for RowSource {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self {
                Self::Csv { records, headers } => match records.next()? {
                    Ok(record) => normalize_row(
                        headers,
                        record.iter().map(|s| Some(s.to_string())),
                    ),
                    Err(e) => return Some(Err(Error::Parse(e.to_string()))),
                },
                Self::Xlsx(rows) => return rows.next().map(Ok),
            };

            if let Some(row) = row {
                return Some(Ok(row));
            }
        }
    }
}

/// `;` if the header line contains one, otherwise `,`.
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains(';') { b';' } else { b',' }
}

fn non_empty(headers: &[String]) -> Vec<String> {
    headers.iter().filter(|h| !h.is_empty()).cloned().collect()
}

fn normalize_row(
    headers: &[String],
    cells: impl Iterator<Item = Option<String>>,
) -> Option<Row> {
    let mut row = Row::new();
    for (header, cell) in headers.iter().zip(cells) {
        if header.is_empty() {
            continue;
        }
        if let Some(value) = cell {
            row.insert(header.clone(), value.trim().to_string());
        }
    }

    row.values().any(|v| !v.is_empty()).then_some(row)
}

/// Text form of a spreadsheet cell, `None` for empty cells.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(_) => Some(
            cell.as_datetime()
                .map(|dt| dt.to_string())
                .unwrap_or_else(|| cell.to_string()),
        ),
        other => Some(other.to_string()),
    }
}
