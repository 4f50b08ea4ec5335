use std::fmt;

use serde::Serialize;

use crate::{ExtractedRecord, FailureKind, RecordStatus, TargetId};

/// Ordered outcome of a harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HarvestReport {
    pub records: Vec<ExtractedRecord>,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl HarvestReport {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Records that ended in `Cancelled`.
    pub fn cancelled(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.failure == Some(FailureKind::Cancelled))
            .count()
    }

    fn count(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Ok => self.succeeded += 1,
            RecordStatus::NotFound => self.not_found += 1,
            RecordStatus::Error => self.failed += 1,
        }
    }
}

impl fmt::Display for HarvestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} succeeded={} not_found={} failed={}",
            self.total(),
            self.succeeded,
            self.not_found,
            self.failed
        )
    }
}

/// Collects records into submission-order slots as they complete in any order.
#[derive(Debug)]
pub struct ReportBuilder {
    target_ids: Vec<TargetId>,
    slots: Vec<Option<ExtractedRecord>>,
}

impl ReportBuilder {
    pub fn new(target_ids: Vec<TargetId>) -> Self {
        let slots = vec![None; target_ids.len()];
        Self { target_ids, slots }
    }

    /// Place the record for the target submitted at `index`. Returns `false`
    /// if the slot was already filled or does not exist; the first record wins.
    pub fn insert(&mut self, index: usize, record: ExtractedRecord) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(record);
                true
            }
            _ => false,
        }
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Finalize in submission order. A slot that never received a record is
    /// reported as cancelled so the one-record-per-target invariant holds.
    pub fn finish(self) -> HarvestReport {
        let mut report = HarvestReport {
            records: Vec::with_capacity(self.slots.len()),
            ..HarvestReport::default()
        };
        for (slot, target_id) in self.slots.into_iter().zip(self.target_ids) {
            let record = slot
                .unwrap_or_else(|| ExtractedRecord::failed(target_id, FailureKind::Cancelled));
            report.count(record.status);
            report.records.push(record);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn out_of_order_inserts_finish_in_submission_order() {
        let mut builder = ReportBuilder::new(vec![10, 11, 12]);
        assert!(builder.insert(2, ExtractedRecord::not_found(12)));
        assert!(builder.insert(0, ExtractedRecord::found(10, Vec::new())));
        assert!(builder.insert(1, ExtractedRecord::failed(11, FailureKind::Timeout)));
        assert_eq!(builder.filled(), 3);

        let report = builder.finish();
        let ids: Vec<_> = report.records.iter().map(|r| r.target_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!((report.succeeded, report.not_found, report.failed), (1, 1, 1));
    }

    #[test]
    fn duplicate_insert_keeps_first_record() {
        let mut builder = ReportBuilder::new(vec![1]);
        assert!(builder.insert(0, ExtractedRecord::not_found(1)));
        assert!(!builder.insert(0, ExtractedRecord::failed(1, FailureKind::Network)));
        assert!(!builder.insert(5, ExtractedRecord::not_found(1)));

        let report = builder.finish();
        assert_eq!(report.records, vec![ExtractedRecord::not_found(1)]);
    }

    #[test]
    fn empty_slots_become_cancelled_records() {
        let mut builder = ReportBuilder::new(vec![1, 2]);
        builder.insert(0, ExtractedRecord::not_found(1));

        let report = builder.finish();
        assert_eq!(report.total(), 2);
        assert_eq!(report.cancelled(), 1);
        assert_eq!(report.records[1].failure, Some(FailureKind::Cancelled));
        assert_eq!(report.to_string(), "total=2 succeeded=0 not_found=1 failed=1");
    }
}
