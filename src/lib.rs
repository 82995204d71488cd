//! tabsearch - ingest tabular files and search them by relevance.
//!
//! CSV and XLSX files are parsed header-first, normalized into ordered
//! string maps and written to a [redb](https://github.com/cberner/redb)
//! store in batches, with progress observable from another thread. Searches
//! are scoped to one file, match terms by case-insensitive substring across
//! a set of fields and rank the matches with tiered field weights.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tabsearch::search::{self, SearchQuery};
//! use tabsearch::{DataDir, Ingestor, ProgressTracker, RecordDb, Settings};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let db = Arc::new(RecordDb::open(&data_dir.records_db()).unwrap());
//! let settings = Settings::load(&db).unwrap();
//!
//! let ingestor = Ingestor::new(db.clone(), Arc::new(ProgressTracker::new()));
//! let file = std::fs::File::open("products.csv").unwrap();
//! let report = ingestor.ingest(file, "products.csv").unwrap();
//!
//! let query = SearchQuery::new(
//!     Some(report.file_id),
//!     vec!["Product".to_string(), "Company".to_string()],
//!     "blue widget",
//! );
//! let page = search::search(db.as_ref(), &query, &settings.weights).unwrap();
//! for r in &page.results {
//!     println!("#{} (score: {}) {:?}", r.record_id, r.score, r.data);
//! }
//! ```

pub mod catalog;
pub mod data_dir;
pub mod error;
pub mod export;
pub mod format;
pub mod ingestion;
pub mod model;
pub mod progress;
pub mod record_db;
pub mod scoring;
pub mod search;
pub mod settings;
pub mod store;
pub mod suggest;
pub mod tabular;
pub mod text_util;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use ingestion::{IngestReport, IngestionJob, Ingestor};
pub use model::{FileHandle, Record, Row};
pub use progress::{IngestionProgress, IngestionStatus, ProgressTracker};
pub use record_db::RecordDb;
pub use scoring::WeightTable;
pub use settings::Settings;
pub use store::RecordStore;
