//! Active/invalid classification of passes.

use super::Pass;
use chrono::NaiveDateTime;

/// Result of classifying a full record set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub active: Vec<Pass>,
    pub invalid: Vec<Pass>,
    pub next_id: u64,
}

/// A pass is invalid once revoked or once its expiry instant is reached.
pub fn is_invalid(pass: &Pass, now: NaiveDateTime) -> bool {
    pass.deletion_time.is_some() || pass.expiry_time <= now
}

/// Next id for a method: one past the highest id ever seen, or 1.
pub fn next_id<'a>(passes: impl IntoIterator<Item = &'a Pass>) -> u64 {
    passes
        .into_iter()
        .map(|pass| pass.id)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Split records into active and invalid sets, preserving input order.
///
/// The next id is computed over the combined set so ids of revoked passes
/// are never reused.
pub fn reclassify(records: Vec<Pass>, now: NaiveDateTime) -> Partition {
    let next_id = next_id(&records);
    let (invalid, active): (Vec<Pass>, Vec<Pass>) = records
        .into_iter()
        .partition(|pass| is_invalid(pass, now));

    Partition {
        active,
        invalid,
        next_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::fixtures::{at, deleted, pass};
    use crate::pass::InvalidStatus;
    use std::collections::HashSet;

    #[test]
    fn test_empty_records() {
        let partition = reclassify(Vec::new(), at(12, 0));
        assert!(partition.active.is_empty());
        assert!(partition.invalid.is_empty());
        assert_eq!(partition.next_id, 1);
    }

    #[test]
    fn test_next_id_spans_invalid_records() {
        let now = at(12, 0);
        let records = vec![
            pass(3, "Active", at(20, 0)),
            deleted(7, "Revoked", at(20, 0), at(11, 0)),
        ];
        let partition = reclassify(records, now);
        assert_eq!(partition.next_id, 8);
        assert_eq!(partition.active.len(), 1);
        assert_eq!(partition.invalid.len(), 1);

        // Same answer when the highest id is active
        let records = vec![
            deleted(3, "Revoked", at(20, 0), at(11, 0)),
            pass(7, "Active", at(20, 0)),
        ];
        assert_eq!(reclassify(records, now).next_id, 8);
    }

    #[test]
    fn test_next_id_saturates_at_max() {
        let partition = reclassify(vec![pass(u64::MAX, "Edge", at(20, 0))], at(12, 0));
        assert_eq!(partition.next_id, u64::MAX);
        assert_eq!(partition.active.len(), 1);
    }

    #[test]
    fn test_expired_without_deletion_is_expired() {
        let partition = reclassify(vec![pass(1, "Guest", at(10, 0))], at(12, 0));
        assert!(partition.active.is_empty());
        assert_eq!(partition.invalid[0].invalid_status(), InvalidStatus::Expired);
    }

    #[test]
    fn test_deleted_regardless_of_expiry() {
        let partition = reclassify(
            vec![deleted(1, "Guest", at(30, 0), at(11, 0))],
            at(12, 0),
        );
        assert!(partition.active.is_empty());
        assert_eq!(partition.invalid[0].invalid_status(), InvalidStatus::Deleted);
    }

    #[test]
    fn test_expiry_boundary_is_invalid() {
        let now = at(12, 0);
        assert!(is_invalid(&pass(1, "Edge", now), now));
        assert!(!is_invalid(&pass(1, "Edge", at(12, 1)), now));
    }

    #[test]
    fn test_partition_covers_every_record_once() {
        let now = at(15, 0);
        let records: Vec<Pass> = (1..=30)
            .map(|id| {
                let expiry = at(1 + (id % 28) as u32, 0);
                if id % 4 == 0 {
                    deleted(id, "d", expiry, at(14, 0))
                } else {
                    pass(id, "p", expiry)
                }
            })
            .collect();

        let partition = reclassify(records.clone(), now);
        assert_eq!(
            partition.active.len() + partition.invalid.len(),
            records.len()
        );

        let active: HashSet<u64> = partition.active.iter().map(|p| p.id).collect();
        let invalid: HashSet<u64> = partition.invalid.iter().map(|p| p.id).collect();
        assert!(active.is_disjoint(&invalid));
        assert_eq!(active.len() + invalid.len(), records.len());

        for record in &partition.active {
            assert!(!is_invalid(record, now));
        }
        for record in &partition.invalid {
            assert!(is_invalid(record, now));
        }
    }
}
