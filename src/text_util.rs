use crate::model::Row;

/// Maximum number of characters of a cell shown in terminal output.
pub const DEFAULT_CELL_MAX_CHARS: usize = 60;

/// Cut `text` to at most `max_chars` characters, appending `...` when
/// anything was removed. Counts characters, not bytes.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Render the requested fields of a row as `Field: value` pairs.
///
/// Fields missing from the row are skipped. When none of the requested
/// fields are present the whole row is shown instead.
pub fn format_row(row: &Row, fields: &[String], max_chars: usize) -> String {
    let pairs: Vec<String> = fields
        .iter()
        .filter_map(|f| row.get_key_value(f.trim()))
        .map(|(k, v)| format!("{k}: {}", truncate_chars(v, max_chars)))
        .collect();

    if !pairs.is_empty() {
        return pairs.join(" | ");
    }

    row.iter()
        .map(|(k, v)| format!("{k}: {}", truncate_chars(v, max_chars)))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Column widths for a left-aligned text table.
pub fn column_widths<'a>(
    header: &[&str],
    rows: impl IntoIterator<Item = &'a [String]>,
) -> Vec<usize> {
    let mut widths: Vec<usize> =
        header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}
