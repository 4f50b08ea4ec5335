use std::fs::File;
use std::io::Read;
use std::path::Path;

use engine_logging::{engine_info, engine_warn};
use harvester_core::{Target, TargetId, TargetKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open input {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read input header: {0}")]
    Header(#[from] csv::Error),
    #[error("input stopped mid-read: {0}")]
    Read(#[source] csv::Error),
    #[error("input has no {0:?} column")]
    MissingColumn(&'static str),
}

/// Header the input file must carry for `kind`, matched case-insensitively.
pub fn input_column(kind: TargetKind) -> &'static str {
    match kind {
        TargetKind::ListingQuery => "Query",
        TargetKind::SiteContact => "Website",
    }
}

pub fn read_targets(
    path: &Path,
    kind: TargetKind,
    listing_base_url: &str,
) -> Result<Vec<Target>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let targets = read_targets_from(file, kind, listing_base_url)?;
    engine_info!("Read {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// One target per data row, ids counting from 1 in row order. A row the
/// reader cannot decode becomes a target carrying a defect rather than
/// aborting the read; a failing underlying reader aborts it.
pub fn read_targets_from<R: Read>(
    reader: R,
    kind: TargetKind,
    listing_base_url: &str,
) -> Result<Vec<Target>, SourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let column = input_column(kind);
    let index = reader
        .headers()?
        .iter()
        .position(|header| {
            header
                .trim_start_matches('\u{feff}')
                .trim()
                .eq_ignore_ascii_case(column)
        })
        .ok_or(SourceError::MissingColumn(column))?;

    let mut targets = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let id = row as TargetId + 1;
        let target = match result {
            Ok(record) => {
                let cell = record.get(index).unwrap_or_default();
                match kind {
                    TargetKind::SiteContact => Target::site_contact(id, cell),
                    TargetKind::ListingQuery => Target::listing_query(id, cell, listing_base_url),
                }
            }
            Err(err) if err.is_io_error() => return Err(SourceError::Read(err)),
            Err(err) => {
                engine_warn!("Input row {} is unreadable: {}", id, err);
                Target::malformed(id, kind, "", err.to_string())
            }
        };
        targets.push(target);
    }
    Ok(targets)
}
