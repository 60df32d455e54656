//! I/O module
//!
//! Handles CSV parsing of operation files and report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, report serialization)
//! - `operation_reader` - Streaming CSV reader with iterator interface

pub mod csv_format;
pub mod operation_reader;

pub use csv_format::{
    convert_csv_record, write_accounts_csv, write_authorizations_csv, CsvRecord,
};
pub use operation_reader::OperationReader;
