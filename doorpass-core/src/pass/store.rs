//! Per-method pass store.

use super::lifecycle::{reclassify, Partition};
use super::{Method, Pass};
use crate::config::ReconcilePolicy;
use crate::{DoorPassError, Result};
use chrono::NaiveDateTime;
use tracing::debug;

/// Active and invalid passes for one unlock method.
#[derive(Debug, Clone)]
pub struct PassStore {
    method: Method,
    active: Vec<Pass>,
    invalid: Vec<Pass>,
    next_id: u64,
    /// Last ticket handed to a load request.
    issued_ticket: u64,
    /// Ticket of the load whose data is currently applied.
    applied_ticket: u64,
}

impl PassStore {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            active: Vec::new(),
            invalid: Vec::new(),
            next_id: 1,
            issued_ticket: 0,
            applied_ticket: 0,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn active(&self) -> &[Pass] {
        &self.active
    }

    pub fn invalid(&self) -> &[Pass] {
        &self.invalid
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn find_active(&self, id: u64) -> Option<&Pass> {
        self.active.iter().find(|pass| pass.id == id)
    }

    pub fn find(&self, id: u64) -> Option<&Pass> {
        self.find_active(id)
            .or_else(|| self.invalid.iter().find(|pass| pass.id == id))
    }

    /// Active pass expiring soonest.
    pub fn nearest_expiring(&self) -> Option<&Pass> {
        self.active.iter().min_by_key(|pass| pass.expiry_time)
    }

    fn apply_partition(&mut self, partition: Partition) {
        self.active = partition.active;
        self.invalid = partition.invalid;
        self.next_id = partition.next_id;
    }

    /// Replace the whole store with a freshly loaded record set.
    pub fn replace(&mut self, records: Vec<Pass>, now: NaiveDateTime) {
        let mut records = records;
        for record in &mut records {
            record.enforce_method_rules(self.method);
        }
        self.apply_partition(reclassify(records, now));
    }

    /// Recompute membership of the current passes against `now`.
    pub fn reclassify(&mut self, now: NaiveDateTime) {
        let mut combined = std::mem::take(&mut self.active);
        combined.append(&mut self.invalid);
        self.apply_partition(reclassify(combined, now));
    }

    /// Append a locally created pass to the active set.
    pub fn insert_local(&mut self, mut pass: Pass) -> Result<()> {
        if self.find(pass.id).is_some() {
            return Err(DoorPassError::InvalidInput(format!(
                "{} pass {} already exists",
                self.method, pass.id
            )));
        }
        pass.enforce_method_rules(self.method);
        self.next_id = self.next_id.max(pass.id.saturating_add(1));
        self.active.push(pass);
        Ok(())
    }

    /// Replace an active pass in place by id.
    pub fn update_local(&mut self, mut pass: Pass) -> Result<()> {
        pass.enforce_method_rules(self.method);
        let slot = self
            .active
            .iter_mut()
            .find(|existing| existing.id == pass.id)
            .ok_or_else(|| {
                DoorPassError::NotFound(format!("active {} pass {}", self.method, pass.id))
            })?;
        *slot = pass;
        Ok(())
    }

    /// Move an active pass to the invalid set, stamping its deletion time.
    pub fn soft_delete(&mut self, id: u64, now: NaiveDateTime) -> Result<Pass> {
        let index = self
            .active
            .iter()
            .position(|pass| pass.id == id)
            .ok_or_else(|| DoorPassError::NotFound(format!("active {} pass {}", self.method, id)))?;

        let mut pass = self.active.remove(index);
        pass.deletion_time = Some(now);
        self.invalid.push(pass.clone());
        Ok(pass)
    }

    /// Hand out a ticket for a load request about to be issued.
    pub fn issue_ticket(&mut self) -> u64 {
        self.issued_ticket += 1;
        self.issued_ticket
    }

    pub fn applied_ticket(&self) -> u64 {
        self.applied_ticket
    }

    /// Decide whether a load response carrying `ticket` may be applied.
    pub fn admit(&mut self, ticket: u64, policy: ReconcilePolicy) -> bool {
        match policy {
            ReconcilePolicy::LastLanding => {
                self.applied_ticket = self.applied_ticket.max(ticket);
                true
            }
            ReconcilePolicy::LatestIssued => {
                if ticket < self.applied_ticket {
                    debug!(
                        "Discarding {} load #{} older than applied #{}",
                        self.method, ticket, self.applied_ticket
                    );
                    return false;
                }
                self.applied_ticket = ticket;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::fixtures::{at, deleted, pass};
    use crate::pass::{InvalidStatus, PassType};

    #[test]
    fn test_new_store_is_empty() {
        let store = PassStore::new(Method::Qr);
        assert!(store.active().is_empty());
        assert!(store.invalid().is_empty());
        assert_eq!(store.next_id(), 1);
        assert!(store.nearest_expiring().is_none());
    }

    #[test]
    fn test_replace_partitions_and_counts() {
        let mut store = PassStore::new(Method::Qr);
        store.replace(
            vec![
                pass(1, "Old", at(1, 0)),
                pass(2, "Current", at(20, 0)),
                deleted(5, "Gone", at(20, 0), at(10, 0)),
            ],
            at(12, 0),
        );
        assert_eq!(store.active().len(), 1);
        assert_eq!(store.invalid().len(), 2);
        assert_eq!(store.next_id(), 6);
    }

    #[test]
    fn test_replace_forces_morse_one_time() {
        let mut store = PassStore::new(Method::Morse);
        store.replace(vec![pass(1, "Knock", at(20, 0))], at(12, 0));
        assert_eq!(store.active()[0].pass_type, PassType::OneTime);
    }

    #[test]
    fn test_insert_local_bumps_next_id() {
        let mut store = PassStore::new(Method::Voice);
        store.insert_local(pass(1, "Alex", at(20, 0))).unwrap();
        store.insert_local(pass(2, "Hinson", at(20, 0))).unwrap();
        assert_eq!(store.next_id(), 3);
        assert_eq!(store.active().len(), 2);

        assert!(store.insert_local(pass(2, "Dup", at(20, 0))).is_err());
    }

    #[test]
    fn test_update_local_replaces_in_place() {
        let mut store = PassStore::new(Method::Voice);
        store.insert_local(pass(1, "Alex", at(20, 0))).unwrap();
        store.insert_local(pass(2, "Sam", at(20, 0))).unwrap();

        store.update_local(pass(1, "Alexandra", at(21, 0))).unwrap();
        assert_eq!(store.active()[0].name, "Alexandra");
        assert_eq!(store.active()[1].name, "Sam");

        assert!(matches!(
            store.update_local(pass(9, "Nobody", at(21, 0))),
            Err(DoorPassError::NotFound(_))
        ));
    }

    #[test]
    fn test_soft_delete_moves_to_invalid() {
        let mut store = PassStore::new(Method::Voice);
        store.insert_local(pass(1, "Alex", at(20, 0))).unwrap();

        let removed = store.soft_delete(1, at(12, 12)).unwrap();
        assert_eq!(removed.deletion_time, Some(at(12, 12)));
        assert!(store.active().is_empty());
        assert_eq!(store.invalid()[0].invalid_status(), InvalidStatus::Deleted);
        assert_eq!(store.next_id(), 2);

        assert!(store.soft_delete(1, at(12, 13)).is_err());
    }

    #[test]
    fn test_reclassify_moves_elapsed_passes() {
        let mut store = PassStore::new(Method::Voice);
        store.insert_local(pass(1, "Short", at(13, 0))).unwrap();
        store.insert_local(pass(2, "Long", at(25, 0))).unwrap();

        store.reclassify(at(12, 0));
        assert_eq!(store.active().len(), 2);

        store.reclassify(at(14, 0));
        assert_eq!(store.active().len(), 1);
        assert_eq!(store.invalid()[0].id, 1);
        assert_eq!(store.invalid()[0].invalid_status(), InvalidStatus::Expired);
    }

    #[test]
    fn test_nearest_expiring() {
        let mut store = PassStore::new(Method::Voice);
        store.insert_local(pass(1, "Later", at(25, 0))).unwrap();
        store.insert_local(pass(2, "Soon", at(14, 0))).unwrap();
        assert_eq!(store.nearest_expiring().unwrap().id, 2);
    }

    #[test]
    fn test_latest_issued_discards_stale_ticket() {
        let mut store = PassStore::new(Method::Qr);
        let first = store.issue_ticket();
        let second = store.issue_ticket();

        assert!(store.admit(second, ReconcilePolicy::LatestIssued));
        assert!(!store.admit(first, ReconcilePolicy::LatestIssued));
        assert_eq!(store.applied_ticket(), second);
    }

    #[test]
    fn test_last_landing_admits_everything() {
        let mut store = PassStore::new(Method::Qr);
        let first = store.issue_ticket();
        let second = store.issue_ticket();

        assert!(store.admit(second, ReconcilePolicy::LastLanding));
        assert!(store.admit(first, ReconcilePolicy::LastLanding));
    }
}
