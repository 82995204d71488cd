use serde::Serialize;

use crate::{
    error::Result,
    search::resolve_file,
    store::{AnyFieldContains, RecordFilter, RecordStore},
};

/// Shorter prefixes produce no suggestions.
pub const MIN_PREFIX_CHARS: usize = 2;
pub const MAX_SUGGESTIONS: usize = 10;

/// Fields searched for suggestions, in priority order.
pub const SUGGESTION_FIELDS: &[&str] = &[
    "Product",
    "IndianCompany",
    "ForeignCompany",
    "Indian Company",
    "Foreign Company",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub value: String,
    pub field: String,
    /// `value (field)`
    pub display: String,
}

impl Suggestion {
    fn new(value: &str, field: &str) -> Self {
        Self {
            value: value.to_string(),
            field: field.to_string(),
            display: format!("{value} ({field})"),
        }
    }
}

/// Distinct values of the priority fields that start with `prefix`,
/// ignoring case.
///
/// Looks at `file_id`, or the active file when none is given; with no
/// active file there is nothing to suggest. Values are collected field by
/// field in priority order and then in store order, and a value already
/// suggested under an earlier field is not repeated.
pub fn suggest(
    store: &dyn RecordStore,
    file_id: Option<u64>,
    prefix: &str,
) -> Result<Vec<Suggestion>> {
    let prefix = prefix.trim();
    if prefix.chars().count() < MIN_PREFIX_CHARS {
        return Ok(Vec::new());
    }

    let file_id = match file_id {
        Some(id) => resolve_file(store, id)?.id,
        None => match store.active_file()? {
            Some(handle) => handle.id,
            None => return Ok(Vec::new()),
        },
    };

    let fields: Vec<String> =
        SUGGESTION_FIELDS.iter().map(|f| f.to_string()).collect();
    let candidates = store.filter(
        &RecordFilter::file(file_id)
            .with_clause(AnyFieldContains::new(&fields, prefix)),
    )?;

    let needle = prefix.to_lowercase();
    let mut suggestions: Vec<Suggestion> = Vec::new();

    for field in SUGGESTION_FIELDS {
        for record in &candidates {
            if suggestions.len() >= MAX_SUGGESTIONS {
                return Ok(suggestions);
            }
            let Some(value) = record.field(field).map(str::trim) else {
                continue;
            };
            if value.is_empty()
                || !value.to_lowercase().starts_with(&needle)
                || suggestions.iter().any(|s| s.value == value)
            {
                continue;
            }
            suggestions.push(Suggestion::new(value, field));
        }
    }

    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        error::Error,
        model::{NewRecord, Row, row},
        record_db::RecordDb,
    };

    fn seed(db: &RecordDb, rows: Vec<Row>) -> u64 {
        let handle = db.create_file_handle("seed.csv", Utc::now()).unwrap();
        let records: Vec<NewRecord> = rows
            .into_iter()
            .map(|data| NewRecord {
                file_id: handle.id,
                data,
            })
            .collect();
        db.insert_many(&records).unwrap();
        handle.id
    }

    fn values(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.value.as_str()).collect()
    }

    #[test]
    fn short_prefix_suggests_nothing() {
        let db = RecordDb::open_in_memory().unwrap();
        seed(&db, vec![row([("Product", "Widget")])]);
        assert!(suggest(&db, None, "w").unwrap().is_empty());
        assert!(suggest(&db, None, " w ").unwrap().is_empty());
    }

    #[test]
    fn prefix_match_ignores_case_and_skips_contains() {
        let db = RecordDb::open_in_memory().unwrap();
        seed(
            &db,
            vec![
                row([("Product", "Widget")]),
                row([("Product", "widget pro")]),
                row([("Product", "Blue Widget")]),
            ],
        );

        let found = suggest(&db, None, "WID").unwrap();
        assert_eq!(values(&found), vec!["Widget", "widget pro"]);
        assert_eq!(found[0].field, "Product");
        assert_eq!(found[0].display, "Widget (Product)");
    }

    #[test]
    fn fields_are_visited_in_priority_order_without_repeats() {
        let db = RecordDb::open_in_memory().unwrap();
        seed(
            &db,
            vec![
                row([("Indian Company", "Acme India"), ("Product", "Other")]),
                row([("IndianCompany", "Acme Exports"), ("Product", "Acme")]),
                row([("ForeignCompany", "Acme")]),
            ],
        );

        let found = suggest(&db, None, "acme").unwrap();
        assert_eq!(values(&found), vec!["Acme", "Acme Exports", "Acme India"]);
        let fields: Vec<&str> = found.iter().map(|s| s.field.as_str()).collect();
        assert_eq!(fields, vec!["Product", "IndianCompany", "Indian Company"]);
    }

    #[test]
    fn other_fields_are_ignored() {
        let db = RecordDb::open_in_memory().unwrap();
        seed(&db, vec![row([("Notes", "widget"), ("Product", "Gadget")])]);
        assert!(suggest(&db, None, "wid").unwrap().is_empty());
    }

    #[test]
    fn at_most_ten_suggestions() {
        let db = RecordDb::open_in_memory().unwrap();
        let names: Vec<String> = (0..15).map(|i| format!("widget {i}")).collect();
        seed(
            &db,
            names.iter().map(|n| row([("Product", n.as_str())])).collect(),
        );

        let found = suggest(&db, None, "widget").unwrap();
        assert_eq!(found.len(), MAX_SUGGESTIONS);
        assert_eq!(found[0].value, "widget 0");
    }

    #[test]
    fn explicit_file_overrides_active() {
        let db = RecordDb::open_in_memory().unwrap();
        let first = seed(&db, vec![row([("Product", "Widget")])]);
        seed(&db, vec![row([("Product", "Wire")])]);

        assert_eq!(values(&suggest(&db, None, "wi").unwrap()), vec!["Wire"]);
        assert_eq!(
            values(&suggest(&db, Some(first), "wi").unwrap()),
            vec!["Widget"]
        );
        assert!(matches!(
            suggest(&db, Some(77), "wi"),
            Err(Error::FileNotFound(77))
        ));
    }

    #[test]
    fn no_active_file_suggests_nothing() {
        let db = RecordDb::open_in_memory().unwrap();
        assert!(suggest(&db, None, "widget").unwrap().is_empty());
    }
}
