use crate::{
    error::{Error, Result},
    record_db::RecordDb,
    scoring::WeightTable,
};

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 20;

pub const BATCH_SIZE: &str = "batch_size";
pub const PAGE_SIZE: &str = "page_size";
pub const WEIGHTS: &str = "weights";

/// Setting keys accepted by `tabsearch config set`.
pub const KNOWN_KEYS: &[&str] = &[BATCH_SIZE, PAGE_SIZE, WEIGHTS];

/// Tunables persisted in the store's settings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Rows per `insert_many` call during ingestion.
    pub batch_size: usize,
    /// Page size used when a search does not ask for one.
    pub page_size: usize,
    pub weights: WeightTable,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            weights: WeightTable::default(),
        }
    }
}

impl Settings {
    /// Read every setting, falling back to defaults for unset keys.
    pub fn load(db: &RecordDb) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(value) = db.get_setting(BATCH_SIZE)? {
            settings.batch_size = parse_positive(BATCH_SIZE, &value)?;
        }
        if let Some(value) = db.get_setting(PAGE_SIZE)? {
            settings.page_size = parse_positive(PAGE_SIZE, &value)?;
        }
        if let Some(value) = db.get_setting(WEIGHTS)? {
            settings.weights = value.parse()?;
        }

        Ok(settings)
    }

    /// Reject unknown keys and malformed values before they are stored.
    pub fn check(key: &str, value: &str) -> Result<()> {
        match key {
            BATCH_SIZE | PAGE_SIZE => parse_positive(key, value).map(|_| ()),
            WEIGHTS => value.parse::<WeightTable>().map(|_| ()),
            _ => Err(Error::Config(format!(
                "unknown setting '{key}' (expected one of: {})",
                KNOWN_KEYS.join(", ")
            ))),
        }
    }

    /// Validate and persist one setting.
    pub fn set(db: &RecordDb, key: &str, value: &str) -> Result<()> {
        Self::check(key, value)?;
        db.set_setting(key, value.trim())?;
        Ok(())
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_stored() {
        let db = RecordDb::open_in_memory().unwrap();
        assert_eq!(Settings::load(&db).unwrap(), Settings::default());
    }

    #[test]
    fn stored_values_override_defaults() {
        let db = RecordDb::open_in_memory().unwrap();
        Settings::set(&db, BATCH_SIZE, "250").unwrap();
        Settings::set(&db, PAGE_SIZE, " 5 ").unwrap();
        Settings::set(&db, WEIGHTS, "9,8,7,6,5,4,3,2,1").unwrap();

        let settings = Settings::load(&db).unwrap();
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.page_size, 5);
        assert_eq!(settings.weights.product.exact, 9);
        assert_eq!(settings.weights.other.contains, 1);
    }

    #[test]
    fn set_rejects_bad_values_without_storing() {
        let db = RecordDb::open_in_memory().unwrap();

        assert!(matches!(
            Settings::set(&db, BATCH_SIZE, "0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::set(&db, PAGE_SIZE, "lots"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::set(&db, WEIGHTS, "1,2,3,4,5,6,7,8,9"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Settings::set(&db, "colour", "blue"),
            Err(Error::Config(_))
        ));
        assert!(db.list_settings().unwrap().is_empty());
    }

    #[test]
    fn load_reports_corrupt_values() {
        let db = RecordDb::open_in_memory().unwrap();
        db.set_setting(PAGE_SIZE, "-3").unwrap();
        assert!(matches!(Settings::load(&db), Err(Error::Config(_))));
    }
}
