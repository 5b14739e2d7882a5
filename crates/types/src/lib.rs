//! Core types for Steward account reconciliation.
//!
//! This crate provides the foundational pieces used throughout Steward:
//! - [`AccountRecord`] and [`AccountStatus`] for per-account state
//! - The released field schemas for the delimited transport format
//! - The line codec (`encode_record` / `decode_record`) with snafu errors

pub mod codec;
pub mod record;

// Re-export commonly used items at crate root
pub use codec::{CodecError, FieldSchema, decode_record, encode_record, format_table, header};
pub use record::{
    AccountRecord, AccountStatus, DEFAULT_DELIMITER, DEFAULT_RESELLER_PREFIX,
    EXPIRING_OBJECTS_ACCOUNT, UNKNOWN,
};
