//! Delimited line codec for account records.
//!
//! Serializes an [`AccountRecord`] to a single delimited line and back, for
//! transport between the collection and verification stages. The field list
//! and order of each [`FieldSchema`] is a released contract; changing either
//! is a breaking format change.
//!
//! `decode_record(encode_record(r, s, d), s, d) == r` holds for every record
//! whose fields are representable in schema `s` (the `Collected` schema
//! defaults the verification-only fields on decode). The format has no
//! quoting or escaping: string fields must not contain the delimiter. A
//! field with an embedded delimiter shifts the field count, so the line is
//! rejected as malformed on decode rather than misparsed.

use snafu::Snafu;

use crate::record::{AccountRecord, AccountStatus, UNKNOWN};

/// Fields emitted by the storage collector, in wire order.
const COLLECTED_FIELDS: &[&str] = &[
    "account",
    "domain_id",
    "project_id",
    "object_count",
    "bytes_used",
    "quota_bytes",
    "status_deleted",
    "created_at",
    "delete_timestamp",
];

/// Full field set after verification: the resolved identity fields followed
/// by the collected fields.
const FULL_FIELDS: &[&str] = &[
    "backend",
    "domain_name",
    "project_name",
    "status",
    "account",
    "domain_id",
    "project_id",
    "object_count",
    "bytes_used",
    "quota_bytes",
    "status_deleted",
    "created_at",
    "delete_timestamp",
];

/// Released line schemas for the transport format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSchema {
    /// Collector output: the nine storage-derived fields.
    Collected,
    /// Verifier output: resolved identity fields plus the collected nine.
    Full,
}

impl FieldSchema {
    /// Field names in wire order.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Collected => COLLECTED_FIELDS,
            Self::Full => FULL_FIELDS,
        }
    }

    /// Number of delimited fields a line must split into.
    pub fn field_count(self) -> usize {
        self.fields().len()
    }
}

/// Error type for line encoding and decoding.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// The line split into a different field count than the schema requires.
    /// Never silently truncated or padded.
    #[snafu(display("malformed record: expected {expected} fields, found {found}"))]
    MalformedRecord {
        /// Field count the schema requires.
        expected: usize,
        /// Field count the line actually split into.
        found: usize,
    },

    /// A field failed to parse into its typed representation.
    #[snafu(display("invalid value '{value}' for field '{field}'"))]
    InvalidField {
        /// Schema field name.
        field: &'static str,
        /// The offending wire value.
        value: String,
    },
}

/// Encodes a record as one delimited line in the schema's field order.
pub fn encode_record(record: &AccountRecord, schema: FieldSchema, delimiter: char) -> String {
    let mut fields = Vec::with_capacity(schema.field_count());
    if schema == FieldSchema::Full {
        fields.push(record.backend.clone());
        fields.push(record.domain_name.clone());
        fields.push(record.project_name.clone());
        fields.push(record.status.to_string());
    }
    fields.push(record.account_id.clone());
    fields.push(record.domain_id.clone());
    fields.push(record.project_id.clone());
    fields.push(record.object_count.to_string());
    fields.push(record.bytes_used.to_string());
    fields.push(record.quota_bytes.to_string());
    fields.push(record.status_deleted.to_string());
    fields.push(record.created_at.clone());
    fields.push(record.delete_timestamp.clone());

    fields.join(&delimiter.to_string())
}

/// Decodes one delimited line into a record, mapping fields positionally.
///
/// Fields absent from the schema keep their unknown defaults.
///
/// # Errors
///
/// Returns [`CodecError::MalformedRecord`] on a field count mismatch and
/// [`CodecError::InvalidField`] when a numeric, boolean, or status field
/// fails to parse.
pub fn decode_record(line: &str, schema: FieldSchema, delimiter: char) -> Result<AccountRecord, CodecError> {
    let values: Vec<&str> = line.split(delimiter).collect();
    if values.len() != schema.field_count() {
        return Err(CodecError::MalformedRecord {
            expected: schema.field_count(),
            found: values.len(),
        });
    }

    let mut record = AccountRecord {
        account_id: String::new(),
        domain_id: UNKNOWN.to_owned(),
        domain_name: UNKNOWN.to_owned(),
        backend: UNKNOWN.to_owned(),
        project_id: String::new(),
        project_name: UNKNOWN.to_owned(),
        status: AccountStatus::Unknown,
        object_count: 0,
        bytes_used: 0,
        quota_bytes: 0,
        status_deleted: false,
        created_at: String::new(),
        delete_timestamp: String::new(),
    };

    let mut values = values.into_iter();
    // Iteration order matches the schema's field list.
    if schema == FieldSchema::Full {
        record.backend = next_value(&mut values).to_owned();
        record.domain_name = next_value(&mut values).to_owned();
        record.project_name = next_value(&mut values).to_owned();
        let status = next_value(&mut values);
        record.status = status.parse().map_err(|_| CodecError::InvalidField {
            field: "status",
            value: status.to_owned(),
        })?;
    }
    record.account_id = next_value(&mut values).to_owned();
    record.domain_id = next_value(&mut values).to_owned();
    record.project_id = next_value(&mut values).to_owned();
    record.object_count = parse_count(next_value(&mut values), "object_count")?;
    record.bytes_used = parse_count(next_value(&mut values), "bytes_used")?;
    record.quota_bytes = parse_count(next_value(&mut values), "quota_bytes")?;
    record.status_deleted = parse_bool(next_value(&mut values), "status_deleted")?;
    record.created_at = next_value(&mut values).to_owned();
    record.delete_timestamp = next_value(&mut values).to_owned();

    Ok(record)
}

/// Header line listing the schema's field names in wire order.
pub fn header(schema: FieldSchema, delimiter: char) -> String {
    schema.fields().join(&delimiter.to_string())
}

/// Formats records as a delimited text table, one row per record, optionally
/// prefixed by a header row. This is the persisted reconciliation artifact.
pub fn format_table(
    records: &[AccountRecord],
    schema: FieldSchema,
    delimiter: char,
    with_header: bool,
) -> String {
    let mut out = String::new();
    if with_header {
        out.push_str(&header(schema, delimiter));
        out.push('\n');
    }
    for record in records {
        out.push_str(&encode_record(record, schema, delimiter));
        out.push('\n');
    }
    out
}

// The field count was validated up front, so the iterator cannot run dry.
fn next_value<'a>(values: &mut impl Iterator<Item = &'a str>) -> &'a str {
    values.next().unwrap_or_default()
}

fn parse_count(value: &str, field: &'static str) -> Result<u64, CodecError> {
    value.parse().map_err(|_| CodecError::InvalidField {
        field,
        value: value.to_owned(),
    })
}

fn parse_bool(value: &str, field: &'static str) -> Result<bool, CodecError> {
    // Accepts Python-era capitalized booleans from older collector output.
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(CodecError::InvalidField {
            field,
            value: value.to_owned(),
        })
    }
}
