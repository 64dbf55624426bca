//! I/O module
//!
//! Handles CSV parsing of recorded queues and journal output for the replay
//! tool.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `sync_reader` - Synchronous CSV reader with iterator interface

pub mod csv_format;
pub mod sync_reader;

pub use csv_format::{convert_queue_record, write_journal_csv, QueueRecord, ReplayStep};
pub use sync_reader::SyncReader;
