use std::{
    io::Read,
    sync::Arc,
    thread::JoinHandle,
};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    format::SourceFormat,
    model::NewRecord,
    progress::{
        IngestionProgress,
        IngestionSlot,
        IngestionStatus,
        ProgressTracker,
        SlotGuard,
    },
    settings::DEFAULT_BATCH_SIZE,
    store::RecordStore,
    tabular::TabularSource,
};

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub file_id: u64,
    pub columns: Vec<String>,
    pub rows_processed: u64,
}

/// Streams CSV/XLSX files into a [`RecordStore`] in fixed-size batches.
///
/// Writes are best effort: every batch commits on its own, so a failure
/// part way through a file leaves the batches already written in place and
/// the file handle with a row count of zero. The failure is recorded in the
/// progress tracker and returned to the caller.
pub struct Ingestor {
    store: Arc<dyn RecordStore>,
    progress: Arc<ProgressTracker>,
    slot: IngestionSlot,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            store,
            progress,
            slot: IngestionSlot::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Ingest a file on the calling thread.
    ///
    /// Fails fast, without touching the store or the progress tracker, when
    /// the extension is unsupported or another ingestion is running.
    pub fn ingest(
        &self,
        reader: impl Read,
        filename: &str,
    ) -> Result<IngestReport> {
        let format = SourceFormat::from_filename(filename)?;
        let slot = self.slot.try_acquire()?;
        self.run(format, reader, filename, slot)
    }

    /// Ingest a file on a dedicated worker thread.
    ///
    /// The format check and slot acquisition happen before this returns, so
    /// rejections are reported synchronously.
    pub fn spawn(
        self: &Arc<Self>,
        reader: impl Read + Send + 'static,
        filename: &str,
    ) -> Result<IngestionJob> {
        let format = SourceFormat::from_filename(filename)?;
        let slot = self.slot.try_acquire()?;

        let ingestor = Arc::clone(self);
        let name = filename.to_string();
        let handle = std::thread::Builder::new()
            .name("ingest".to_string())
            .spawn(move || ingestor.run(format, reader, &name, slot))?;

        Ok(IngestionJob {
            handle,
            progress: Arc::clone(&self.progress),
        })
    }

    fn run(
        &self,
        format: SourceFormat,
        reader: impl Read,
        filename: &str,
        _slot: SlotGuard,
    ) -> Result<IngestReport> {
        let created = self.store.create_file_handle(filename, Utc::now());
        self.progress.begin(filename);
        info!(filename, ?format, "ingestion started");

        let result = created
            .map_err(Error::from)
            .and_then(|handle| self.load(format, reader, handle.id));

        match result {
            Ok(report) => {
                self.progress
                    .update(|p| p.status = IngestionStatus::Completed);
                info!(
                    filename,
                    file_id = report.file_id,
                    rows = report.rows_processed,
                    "ingestion completed"
                );
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(filename, error = %message, "ingestion failed");
                self.progress.update(|p| {
                    p.status = IngestionStatus::Error;
                    p.error = Some(message);
                });
                Err(e)
            }
        }
    }

    fn load(
        &self,
        format: SourceFormat,
        mut reader: impl Read,
        file_id: u64,
    ) -> Result<IngestReport> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        let source = TabularSource::open(format, bytes)?;
        let columns = source.columns.clone();
        let total_rows = source.total_rows;
        self.progress.update(|p| {
            p.total_rows = total_rows;
            p.columns = columns.clone();
        });

        let mut batch = Vec::with_capacity(self.batch_size);
        let mut processed = 0u64;

        for row in source {
            batch.push(NewRecord {
                file_id,
                data: row?,
            });
            processed += 1;
            self.progress.update(|p| p.processed_rows = processed);

            if batch.len() >= self.batch_size {
                self.flush(&mut batch)?;
            }
        }
        self.flush(&mut batch)?;

        self.store.set_row_count(file_id, processed)?;
        if !self.store.set_active_file(file_id)? {
            return Err(Error::FileNotFound(file_id));
        }

        Ok(IngestReport {
            file_id,
            columns,
            rows_processed: processed,
        })
    }

    fn flush(&self, batch: &mut Vec<NewRecord>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.store.insert_many(batch)?;
        debug!(rows = batch.len(), "flushed batch");
        batch.clear();
        Ok(())
    }
}

/// Handle to an ingestion running on a worker thread.
pub struct IngestionJob {
    handle: JoinHandle<Result<IngestReport>>,
    progress: Arc<ProgressTracker>,
}

impl IngestionJob {
    pub fn progress(&self) -> IngestionProgress {
        self.progress.get()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker finishes and return its result.
    pub fn wait(self) -> Result<IngestReport> {
        self.handle.join().map_err(|_| {
            Error::Io(std::io::Error::other("ingestion worker panicked"))
        })?
    }
}
