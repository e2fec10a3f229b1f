//! JSONL record log with file rotation
//!
//! The relay hands records to a [`TelemetrySink`] which never blocks: when
//! the writer falls behind, records are dropped. A blocking task drains the
//! channel into `telemetry_<timestamp>_<seq>.jsonl` files, starting a new
//! file every `max_records_per_file` records and deleting the oldest files
//! beyond `max_files_to_keep`.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::message::record::TelemetryRecord;

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = ".jsonl";

/// Records buffered between the relay and the writer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// One line of the log
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEntry {
    pub logged_at: DateTime<Utc>,
    /// Checksum matched the payload
    pub intact: bool,
    #[serde(flatten)]
    pub record: TelemetryRecord,
}

impl TelemetryEntry {
    pub fn new(record: TelemetryRecord, intact: bool) -> Self {
        Self {
            logged_at: Utc::now(),
            intact,
            record,
        }
    }
}

/// Non-blocking handle used by the relay
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    tx: mpsc::Sender<TelemetryEntry>,
}

impl TelemetrySink {
    /// Queue a record; returns false if it was dropped
    pub fn submit(&self, record: &TelemetryRecord, intact: bool) -> bool {
        match self.tx.try_send(TelemetryEntry::new(*record, intact)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Telemetry log behind, dropping record {}", record.msg_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Rotating JSONL writer
#[derive(Debug)]
pub struct TelemetryLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    sequence: u32,
}

impl TelemetryLogger {
    /// Create the log directory if needed
    ///
    /// # Errors
    ///
    /// `Io` if the directory cannot be created
    pub fn new<P: AsRef<Path>>(
        dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            writer: None,
            records_in_file: 0,
            sequence: 0,
        })
    }

    /// Append one entry, rotating first if the current file is full
    ///
    /// # Errors
    ///
    /// `Io` on any file error
    pub fn write_entry(&mut self, entry: &TelemetryEntry) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, entry).map_err(std::io::Error::from)?;
            writer.write_all(b"\n")?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.flush()?;

        let name = format!(
            "{}{}_{:04}{}",
            FILE_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S"),
            self.sequence,
            FILE_EXTENSION
        );
        self.sequence = self.sequence.wrapping_add(1);

        let path = self.dir.join(name);
        let file = File::create(&path)?;
        info!("Telemetry log file: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.prune()
    }

    /// Delete the oldest log files beyond the retention limit
    fn prune(&self) -> Result<()> {
        let mut files = log_files(&self.dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        let excess = files.len() - self.max_files_to_keep;
        for path in files.drain(..excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed old telemetry log {}", path.display()),
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        Ok(())
    }
}

/// Log files in `dir`, oldest first
pub fn log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXTENSION))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Start the writer task
///
/// The task ends, flushing its file, once every sink clone is dropped.
pub fn spawn(mut logger: TelemetryLogger, capacity: usize) -> (TelemetrySink, JoinHandle<Result<()>>) {
    let (tx, mut rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        while let Some(entry) = rx.blocking_recv() {
            if let Err(e) = logger.write_entry(&entry) {
                warn!("Failed to write telemetry record: {}", e);
            }
        }
        logger.flush()
    });

    (TelemetrySink { tx }, handle)
}
