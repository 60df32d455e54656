//! Streaming CSV reader over operation records
//!
//! Provides an iterator over the operations in a CSV file. CSV format concerns
//! are delegated to the `csv_format` module.
//!
//! # Design
//!
//! The reader wraps a `csv::Reader` and deserializes one row at a time, so the
//! file is never loaded into memory as a whole. Each row is converted with
//! `csv_format::convert_csv_record`.
//!
//! ```no_run
//! use card_auth_ledger::io::OperationReader;
//! use std::path::Path;
//!
//! let reader = OperationReader::open(Path::new("operations.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(operation) => println!("{:?}", operation),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Opening a missing or unreadable file fails in `open()`
//! - A malformed row is yielded as `PaymentError::ParseError` carrying the
//!   line number (header is line 1) and iteration continues with the next row

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{Operation, PaymentError};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Iterator over the operations of a CSV source
#[derive(Debug)]
pub struct OperationReader<R: Read = File> {
    reader: csv::Reader<R>,
    line_num: u64,
}

impl OperationReader<File> {
    /// Open a CSV file for streaming
    ///
    /// # Errors
    ///
    /// * `FileNotFound` if the path does not exist
    /// * `IoError` for any other failure to open the file
    pub fn open(path: &Path) -> Result<Self, PaymentError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PaymentError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => PaymentError::IoError {
                message: format!("Failed to open file '{}': {}", path.display(), e),
            },
        })?;

        Ok(Self::from_reader(file))
    }
}

impl<R: Read> OperationReader<R> {
    /// Wrap any byte source
    ///
    /// The CSV reader is configured to trim whitespace from all fields and to
    /// accept rows with fewer columns than the header, since only
    /// `authorize` rows fill every column.
    pub fn from_reader(source: R) -> Self {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(source);

        Self {
            reader,
            line_num: 1,
        }
    }
}

impl<R: Read> Iterator for OperationReader<R> {
    type Item = Result<Operation, PaymentError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;

        let line = self.line_num;
        Some(
            next.map_err(|e| format!("CSV parse error: {}", e))
                .and_then(convert_csv_record)
                .map_err(|message| PaymentError::ParseError {
                    line: Some(line),
                    message,
                }),
        )
    }
}
