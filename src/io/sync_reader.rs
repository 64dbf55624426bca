//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over the steps of a recorded transaction
//! queue. Format concerns are delegated to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<ReplayStep, StoreError>` for each CSV row:
//!
//! ```no_run
//! use storekit_manager::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("queue.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(step) => println!("Replaying: {:?}", step),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual record errors are yielded as `StoreError::ParseError` with the
//!   line number (header is line 1)

use crate::io::csv_format::{convert_queue_record, QueueRecord, ReplayStep};
use crate::types::StoreError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous CSV reader over queue records
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open a recorded queue for streaming iteration
    ///
    /// The CSV reader trims whitespace from all fields and accepts rows
    /// without the trailing error_code column.
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` if the file opened successfully
    /// * `Err(StoreError::FileNotFound)` if there is no file at `path`
    /// * `Err(StoreError::IoError)` for any other open failure
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => StoreError::from(e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<ReplayStep, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<QueueRecord>();
        let result = deserializer.next()?;
        self.line_num += 1;

        Some(match result {
            Ok(record) => convert_queue_record(record)
                .map_err(|e| StoreError::parse_error(Some(self.line_num), &e)),
            Err(e) => Err(StoreError::parse_error(Some(self.line_num), &e.to_string())),
        })
    }
}
