use std::io::{self, Write};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Error, Result},
    model::{FileHandle, Record, Row},
    scoring::{WeightTable, score_terms},
    settings::DEFAULT_PAGE_SIZE,
    store::{AnyFieldContains, RecordFilter, RecordStore},
    text_util::{DEFAULT_CELL_MAX_CHARS, format_row},
};

/// A multi-field query against one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// `None` is reported as [`Error::MissingFileId`].
    pub file_id: Option<u64>,
    /// Fields to match; a term matches when any of them contains it.
    pub fields: Vec<String>,
    /// Terms that must all match.
    pub terms: Vec<String>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl SearchQuery {
    /// First page of a query, with terms split from `raw` on whitespace.
    pub fn new(file_id: Option<u64>, fields: Vec<String>, raw: &str) -> Self {
        Self {
            file_id,
            fields,
            terms: Self::terms_from(raw),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn terms_from(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    /// Trimmed, non-blank field names.
    pub fn fields(&self) -> Vec<String> {
        non_blank(&self.fields)
    }

    /// Trimmed, non-blank terms.
    pub fn terms(&self) -> Vec<String> {
        non_blank(&self.terms)
    }
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// A matched record and its relevance. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedResult {
    pub record_id: u64,
    pub score: u32,
    pub data: Row,
}

/// One page of ranked results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub results: Vec<RankedResult>,
    /// Matches before pagination.
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl SearchPage {
    fn empty(page: usize, page_size: usize) -> Self {
        Self {
            results: Vec::new(),
            total_count: 0,
            page,
            page_size,
            total_pages: 0,
        }
    }
}

/// Check the query's fields and file id, in that order, and return the
/// cleaned fields with the id.
pub(crate) fn validate(query: &SearchQuery) -> Result<(u64, Vec<String>)> {
    let fields = query.fields();
    if fields.is_empty() {
        return Err(Error::MissingFields);
    }
    let file_id = query.file_id.ok_or(Error::MissingFileId)?;
    Ok((file_id, fields))
}

pub(crate) fn resolve_file(
    store: &dyn RecordStore,
    file_id: u64,
) -> Result<FileHandle> {
    store
        .get_file_handle(file_id)?
        .ok_or(Error::FileNotFound(file_id))
}

/// Records of `file_id` where every term is contained in at least one of
/// `fields`, in store order.
pub(crate) fn matching_records(
    store: &dyn RecordStore,
    file_id: u64,
    fields: &[String],
    terms: &[String],
) -> Result<Vec<Record>> {
    let filter = terms
        .iter()
        .fold(RecordFilter::file(file_id), |filter, term| {
            filter.with_clause(AnyFieldContains::new(fields, term))
        });
    Ok(store.filter(&filter)?)
}

/// Execute a search.
///
/// 1. Validate fields, file id and paging, then resolve the file
/// 2. Short-circuit to an empty page when there are no terms
/// 3. Filter in the store (AND across terms, OR across fields)
/// 4. Score every match and sort by score, keeping store order on ties
/// 5. Slice out the requested page
pub fn search(
    store: &dyn RecordStore,
    query: &SearchQuery,
    weights: &WeightTable,
) -> Result<SearchPage> {
    let (file_id, fields) = validate(query)?;
    if query.page == 0 {
        return Err(Error::Validation("page must be at least 1".into()));
    }
    if query.page_size == 0 {
        return Err(Error::Validation("page size must be at least 1".into()));
    }
    resolve_file(store, file_id)?;

    let terms = query.terms();
    if terms.is_empty() {
        return Ok(SearchPage::empty(query.page, query.page_size));
    }

    let matches = matching_records(store, file_id, &fields, &terms)?;

    let mut ranked: Vec<RankedResult> = matches
        .into_par_iter()
        .map(|record| RankedResult {
            score: score_terms(&record.data, &fields, &terms, weights),
            record_id: record.id,
            data: record.data,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let total_count = ranked.len();
    let total_pages = total_count.div_ceil(query.page_size);
    let start = (query.page - 1).saturating_mul(query.page_size);
    let results: Vec<RankedResult> = ranked
        .into_iter()
        .skip(start)
        .take(query.page_size)
        .collect();

    debug!(
        file_id,
        terms = terms.len(),
        total_count,
        page = query.page,
        "search finished"
    );

    Ok(SearchPage {
        results,
        total_count,
        page: query.page,
        page_size: query.page_size,
        total_pages,
    })
}

/// Format a page for human-readable terminal output.
pub fn format_human(
    out: &mut impl Write,
    page: &SearchPage,
    fields: &[String],
) -> io::Result<()> {
    if page.results.is_empty() {
        writeln!(out, "No results found.")?;
        if page.total_count > 0 {
            writeln!(
                out,
                "\npage {} of {} ({} result(s))",
                page.page, page.total_pages, page.total_count
            )?;
        }
        return Ok(());
    }

    let first_rank = (page.page - 1) * page.page_size + 1;
    for (i, r) in page.results.iter().enumerate() {
        writeln!(out, "{:>3}. [{}] #{}", first_rank + i, r.score, r.record_id)?;
        writeln!(
            out,
            "     {}",
            format_row(&r.data, fields, DEFAULT_CELL_MAX_CHARS)
        )?;
    }
    writeln!(
        out,
        "\npage {} of {} ({} result(s))",
        page.page, page.total_pages, page.total_count
    )
}

/// Format a page as a single line of JSON.
pub fn format_json(out: &mut impl Write, page: &SearchPage) -> io::Result<()> {
    serde_json::to_writer(&mut *out, page)?;
    writeln!(out)
}
