use std::path::{Path, PathBuf};

use engine_logging::engine_info;
use harvester_core::{ExtractedRecord, HarvestReport, RecordStatus, Target, TargetId, TargetKind, PLACEHOLDER};
use serde_json::json;
use thiserror::Error;

use crate::persist::{write_atomic, PersistError};

/// Cell written in place of a value for a target that failed.
pub const ERROR_CELL: &str = "Error";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot render results: {0}")]
    Render(String),
    #[error("no record for target {0} in position")]
    Misaligned(TargetId),
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        /// The output that could not be written, so it is not lost.
        rendered: String,
        #[source]
        source: PersistError,
    },
    #[error("cannot write manifest: {0}")]
    Manifest(String),
}

impl SinkError {
    pub fn rendered(&self) -> Option<&str> {
        match self {
            SinkError::Write { rendered, .. } => Some(rendered),
            _ => None,
        }
    }
}

impl From<csv::Error> for SinkError {
    fn from(err: csv::Error) -> Self {
        SinkError::Render(err.to_string())
    }
}

pub fn header(kind: TargetKind) -> &'static [&'static str] {
    match kind {
        TargetKind::SiteContact => &["Website", "email_2"],
        TargetKind::ListingQuery => &["Query", "name", "address"],
    }
}

/// Render the result table: the input value echoed beside what was found,
/// one row per target (one per listing entry) in input order.
pub fn render_csv(kind: TargetKind, targets: &[Target], report: &HarvestReport) -> Result<String, SinkError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(header(kind))?;

    for (index, target) in targets.iter().enumerate() {
        let record = report
            .records
            .get(index)
            .filter(|record| record.target_id == target.id)
            .ok_or(SinkError::Misaligned(target.id))?;
        for row in rows(kind, target, record) {
            writer.write_record(&row)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| SinkError::Render(err.error().to_string()))?;
    String::from_utf8(bytes).map_err(|err| SinkError::Render(err.to_string()))
}

fn rows(kind: TargetKind, target: &Target, record: &ExtractedRecord) -> Vec<Vec<String>> {
    let raw = target.raw.clone();
    let value_columns = header(kind).len() - 1;
    let filler = |cell: &str| {
        let mut row = vec![raw.clone()];
        row.extend(std::iter::repeat(cell.to_string()).take(value_columns));
        vec![row]
    };

    match (record.status, kind) {
        (RecordStatus::Error, _) => filler(ERROR_CELL),
        (RecordStatus::NotFound, _) => filler(PLACEHOLDER),
        (RecordStatus::Ok, _) if record.fields.is_empty() => filler(PLACEHOLDER),
        (RecordStatus::Ok, TargetKind::SiteContact) => {
            let email = record.first_value("email").unwrap_or(PLACEHOLDER);
            vec![vec![raw.clone(), email.to_string()]]
        }
        (RecordStatus::Ok, TargetKind::ListingQuery) => record
            .fields
            .iter()
            .map(|fields| {
                let cell = |name: &str| {
                    fields
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| PLACEHOLDER.to_string())
                };
                vec![raw.clone(), cell("name"), cell("address")]
            })
            .collect(),
    }
}

pub fn write_results(
    path: &Path,
    kind: TargetKind,
    targets: &[Target],
    report: &HarvestReport,
) -> Result<PathBuf, SinkError> {
    let rendered = render_csv(kind, targets, report)?;
    match write_atomic(path, rendered.as_bytes()) {
        Ok(written) => {
            engine_info!("Wrote {} records to {}", report.total(), written.display());
            Ok(written)
        }
        Err(source) => Err(SinkError::Write {
            path: path.to_path_buf(),
            rendered,
            source,
        }),
    }
}

/// Run summary plus per-target status, failure kind and every extracted
/// field, as JSON. Fields the CSV has no column for (phones, social
/// profiles, all emails) only appear here.
pub fn render_manifest(targets: &[Target], report: &HarvestReport) -> Result<String, SinkError> {
    let entries: Vec<_> = targets
        .iter()
        .zip(&report.records)
        .map(|(target, record)| {
            json!({
                "id": target.id,
                "input": target.raw,
                "status": record.status,
                "failure": record.failure.as_ref().map(ToString::to_string),
                "retries": record.retries,
                "defect": target.defect,
                "fields": record.fields,
            })
        })
        .collect();

    let manifest = json!({
        "total": report.total(),
        "succeeded": report.succeeded,
        "not_found": report.not_found,
        "failed": report.failed,
        "cancelled": report.cancelled(),
        "targets": entries,
    });
    serde_json::to_string_pretty(&manifest).map_err(|err| SinkError::Manifest(err.to_string()))
}

pub fn write_manifest(path: &Path, targets: &[Target], report: &HarvestReport) -> Result<PathBuf, SinkError> {
    let rendered = render_manifest(targets, report)?;
    write_atomic(path, rendered.as_bytes()).map_err(|err| SinkError::Manifest(err.to_string()))
}
