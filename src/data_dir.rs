//! Where tabsearch keeps its record store.
//!
//! Everything tabsearch persists (file handles, records and settings)
//! lives in one redb file, `records.redb`, under the data directory.

use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    record_db::RecordDb,
};

/// Overrides the XDG location when `--data-dir` is not given.
pub const DATA_DIR_ENV: &str = "TABSEARCH_DATA_DIR";

const XDG_PREFIX: &str = "tabsearch";
const RECORDS_DB: &str = "records.redb";

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Pick the directory holding `records.redb`: `--data-dir` if given,
    /// then `TABSEARCH_DATA_DIR`, then `$XDG_DATA_HOME/tabsearch`. The
    /// directory is created if it does not exist yet.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(DATA_DIR_ENV) {
                Some(val) if !val.is_empty() => PathBuf::from(val),
                _ => xdg_data_home()?,
            },
        };

        if !root.is_dir() {
            std::fs::create_dir_all(&root)
                .map_err(|_| Error::DataDir(root.clone()))?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records_db(&self) -> PathBuf {
        self.root.join(RECORDS_DB)
    }

    /// Open (or create) the record store inside this directory.
    pub fn open_store(&self) -> Result<RecordDb> {
        Ok(RecordDb::open(&self.records_db())?)
    }
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix(XDG_PREFIX)
        .get_data_home()
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}
