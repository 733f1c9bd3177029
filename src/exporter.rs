//!
//! CSV output of fetched audit logs.
//!
use crate::{AuditRecord, Result};

/// File written by the command line tool, relative to the working directory
pub const OUTPUT_FILE: &str = "audit_logs.csv";

/// Column labels, in field order
pub const HEADERS: [&str; 6] = [
    "ID",
    "Operation",
    "Username",
    "Resource",
    "Resource Type",
    "Operation Time",
];

/// Create or overwrite `path` with one row per record.
pub fn write_csv<P: AsRef<std::path::Path>>(records: &[AuditRecord], path: P) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_records(records, file)
}

/// Write the header row and one row per record to `writer`.
pub fn write_records<W: std::io::Write>(records: &[AuditRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(HEADERS)?;

    for record in records {
        writer.write_record(&[
            record.id.to_string(),
            record.operation.clone(),
            record.actor.clone(),
            record.resource.clone(),
            record.resource_type.clone(),
            record
                .timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        ])?;
    }

    writer.flush()?;
    tracing::debug!("wrote {} audit logs", records.len());
    Ok(())
}
