//! Dashboard state container.
//!
//! All mutations of pass stores, the notice log, the loading indicator and
//! the sort selections go through [`Dashboard::apply`]. Async code shares
//! the container as [`SharedDashboard`] and holds the lock only for the
//! duration of one `apply` call.

use crate::config::{DashboardConfig, ReconcilePolicy};
use crate::notice::{ActionRecord, NoticeLog, PushOutcome};
use crate::pass::{Credential, Method, Pass, PassStore};
use crate::sort::{ActiveSortField, InvalidSortField, SortState};
use crate::timestamp::parse_timestamp;
use crate::{DoorPassError, Result};
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub type SharedDashboard = Arc<Mutex<Dashboard>>;

/// A state transition.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    /// A remote request for `method` went out.
    RequestStarted { method: Method },
    /// A remote request for `method` completed, successfully or not.
    RequestFinished { method: Method },
    /// A full load for `method` is about to be issued.
    LoadIssued { method: Method },
    /// A full record set arrived for the load holding `ticket`.
    Loaded {
        method: Method,
        ticket: u64,
        records: Vec<Pass>,
        now: NaiveDateTime,
    },
    LocalCreated { method: Method, pass: Pass },
    LocalUpdated { method: Method, pass: Pass },
    LocalDeleted {
        method: Method,
        id: u64,
        now: NaiveDateTime,
    },
    /// Periodic reclassification of local-only stores.
    ExpirySwept { now: NaiveDateTime },
    NoticeAdded {
        message: String,
        method: String,
        at: NaiveDateTime,
    },
    NoticesPushed { seq: u64, batch: Vec<ActionRecord> },
    SortActive(ActiveSortField),
    SortInvalid(InvalidSortField),
}

/// What an event did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The event was stale and left the state untouched.
    Discarded,
    /// A load ticket was handed out.
    Issued(u64),
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    qr: PassStore,
    morse: PassStore,
    voice: PassStore,
    notices: NoticeLog,
    loading: usize,
    active_sort: SortState<ActiveSortField>,
    invalid_sort: SortState<InvalidSortField>,
    reconcile_policy: ReconcilePolicy,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            qr: PassStore::new(Method::Qr),
            morse: PassStore::new(Method::Morse),
            voice: PassStore::new(Method::Voice),
            notices: NoticeLog::default(),
            loading: 0,
            active_sort: SortState::default(),
            invalid_sort: SortState::default(),
            reconcile_policy: ReconcilePolicy::default(),
        }
    }
}

impl Dashboard {
    /// Build the initial state, seeding voice passes from the config.
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let mut dashboard = Self {
            notices: NoticeLog::new(config.notice_capacity, config.notice_policy),
            reconcile_policy: config.reconcile_policy,
            ..Self::default()
        };

        for seed in &config.voice_passes {
            let pass = Pass {
                id: seed.id,
                name: seed.name.clone(),
                pass_type: seed.pass_type,
                expiry_time: parse_timestamp(&seed.expiry_time)?,
                deletion_time: None,
                credential: Credential::None,
            };
            dashboard.voice.insert_local(pass)?;
        }
        info!(
            "Dashboard initialised with {} voice pass(es)",
            dashboard.voice.active().len()
        );

        Ok(dashboard)
    }

    pub fn into_shared(self) -> SharedDashboard {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self, method: Method) -> &PassStore {
        match method {
            Method::Qr => &self.qr,
            Method::Morse => &self.morse,
            Method::Voice => &self.voice,
        }
    }

    fn store_mut(&mut self, method: Method) -> &mut PassStore {
        match method {
            Method::Qr => &mut self.qr,
            Method::Morse => &mut self.morse,
            Method::Voice => &mut self.voice,
        }
    }

    pub fn notices(&self) -> &NoticeLog {
        &self.notices
    }

    /// Whether any remote request is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading > 0
    }

    pub fn in_flight(&self) -> usize {
        self.loading
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        self.reconcile_policy
    }

    pub fn active_sort(&self) -> SortState<ActiveSortField> {
        self.active_sort
    }

    pub fn invalid_sort(&self) -> SortState<InvalidSortField> {
        self.invalid_sort
    }

    /// Active passes of `method` in the current sort order.
    pub fn sorted_active(&self, method: Method) -> Vec<Pass> {
        self.active_sort.sorted(self.store(method).active())
    }

    /// Invalid passes of `method` in the current sort order.
    pub fn sorted_invalid(&self, method: Method) -> Vec<Pass> {
        self.invalid_sort.sorted(self.store(method).invalid())
    }

    pub fn nearest_expiring(&self, method: Method) -> Option<&Pass> {
        self.store(method).nearest_expiring()
    }

    pub fn apply(&mut self, event: DashboardEvent) -> Result<Outcome> {
        match event {
            DashboardEvent::RequestStarted { method } => {
                self.loading += 1;
                debug!("{} request started ({} in flight)", method, self.loading);
            }
            DashboardEvent::RequestFinished { method } => {
                self.loading = self.loading.saturating_sub(1);
                debug!("{} request finished ({} in flight)", method, self.loading);
            }
            DashboardEvent::LoadIssued { method } => {
                return Ok(Outcome::Issued(self.store_mut(method).issue_ticket()));
            }
            DashboardEvent::Loaded {
                method,
                ticket,
                records,
                now,
            } => {
                let policy = self.reconcile_policy;
                let store = self.store_mut(method);
                if !store.admit(ticket, policy) {
                    return Ok(Outcome::Discarded);
                }
                store.replace(records, now);
                info!(
                    "Loaded {} passes: {} active, {} invalid",
                    method,
                    store.active().len(),
                    store.invalid().len()
                );
            }
            DashboardEvent::LocalCreated { method, pass } => {
                self.local_store(method)?.insert_local(pass)?;
            }
            DashboardEvent::LocalUpdated { method, pass } => {
                self.local_store(method)?.update_local(pass)?;
            }
            DashboardEvent::LocalDeleted { method, id, now } => {
                self.local_store(method)?.soft_delete(id, now)?;
            }
            DashboardEvent::ExpirySwept { now } => {
                for method in Method::ALL {
                    self.store_mut(method).reclassify(now);
                }
            }
            DashboardEvent::NoticeAdded {
                message,
                method,
                at,
            } => {
                self.notices.add(&message, &method, at);
            }
            DashboardEvent::NoticesPushed { seq, batch } => {
                if self.notices.apply_push(seq, &batch) == PushOutcome::Stale {
                    return Ok(Outcome::Discarded);
                }
            }
            DashboardEvent::SortActive(field) => self.active_sort.toggle(field),
            DashboardEvent::SortInvalid(field) => self.invalid_sort.toggle(field),
        }
        Ok(Outcome::Applied)
    }

    fn local_store(&mut self, method: Method) -> Result<&mut PassStore> {
        if method.has_remote() {
            return Err(DoorPassError::InvalidInput(format!(
                "{} passes are managed by the lock",
                method
            )));
        }
        Ok(self.store_mut(method))
    }
}

/// Lock the shared dashboard.
pub fn lock(shared: &SharedDashboard) -> Result<MutexGuard<'_, Dashboard>> {
    shared
        .lock()
        .map_err(|_| DoorPassError::LockPoisoned("dashboard".to_string()))
}

/// Apply one event to the shared dashboard.
pub fn dispatch(shared: &SharedDashboard, event: DashboardEvent) -> Result<Outcome> {
    lock(shared)?.apply(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeMergePolicy;
    use crate::pass::fixtures::{at, pass};
    use crate::sort::SortDirection;

    #[test]
    fn test_from_config_seeds_voice_passes() {
        let config = DashboardConfig::from_toml(
            r#"
            [[voice_passes]]
            id = 1
            name = "Alex"
            expiry_time = "2025-05-15T21:00"

            [[voice_passes]]
            id = 2
            name = "Hinson"
            type = "one-time"
            expiry_time = "2025-05-28T19:00"
            "#,
        )
        .unwrap();

        let dashboard = Dashboard::from_config(&config).unwrap();
        let voice = dashboard.store(Method::Voice);
        assert_eq!(voice.active().len(), 2);
        assert_eq!(voice.next_id(), 3);
        assert!(dashboard.store(Method::Qr).active().is_empty());
    }

    #[test]
    fn test_from_config_rejects_bad_seed_time() {
        let config = DashboardConfig::from_toml(
            r#"
            [[voice_passes]]
            id = 1
            name = "Alex"
            expiry_time = "next friday"
            "#,
        )
        .unwrap();
        assert!(matches!(
            Dashboard::from_config(&config),
            Err(DoorPassError::Timestamp(_))
        ));
    }

    #[test]
    fn test_loading_counter_never_underflows() {
        let mut dashboard = Dashboard::default();
        let method = Method::Qr;
        dashboard.apply(DashboardEvent::RequestStarted { method }).unwrap();
        dashboard.apply(DashboardEvent::RequestStarted { method }).unwrap();
        dashboard.apply(DashboardEvent::RequestFinished { method }).unwrap();
        assert!(dashboard.is_loading());
        dashboard.apply(DashboardEvent::RequestFinished { method }).unwrap();
        dashboard.apply(DashboardEvent::RequestFinished { method }).unwrap();
        assert!(!dashboard.is_loading());
        assert_eq!(dashboard.in_flight(), 0);
    }

    #[test]
    fn test_stale_load_discarded_under_default_policy() {
        let mut dashboard = Dashboard::default();
        let method = Method::Qr;
        let Outcome::Issued(old) = dashboard.apply(DashboardEvent::LoadIssued { method }).unwrap()
        else {
            panic!("expected a ticket");
        };
        let Outcome::Issued(new) = dashboard.apply(DashboardEvent::LoadIssued { method }).unwrap()
        else {
            panic!("expected a ticket");
        };

        let loaded = |ticket, name: &str| DashboardEvent::Loaded {
            method,
            ticket,
            records: vec![pass(1, name, at(20, 0))],
            now: at(12, 0),
        };
        assert_eq!(dashboard.apply(loaded(new, "fresh")).unwrap(), Outcome::Applied);
        assert_eq!(dashboard.apply(loaded(old, "stale")).unwrap(), Outcome::Discarded);
        assert_eq!(dashboard.store(method).active()[0].name, "fresh");
    }

    #[test]
    fn test_local_events_refused_for_remote_methods() {
        let mut dashboard = Dashboard::default();
        let result = dashboard.apply(DashboardEvent::LocalCreated {
            method: Method::Morse,
            pass: pass(1, "Knock", at(20, 0)),
        });
        assert!(matches!(result, Err(DoorPassError::InvalidInput(_))));
    }

    #[test]
    fn test_voice_lifecycle_and_sweep() {
        let mut dashboard = Dashboard::default();
        let method = Method::Voice;
        dashboard
            .apply(DashboardEvent::LocalCreated {
                method,
                pass: pass(1, "Alex", at(13, 0)),
            })
            .unwrap();
        dashboard
            .apply(DashboardEvent::LocalCreated {
                method,
                pass: pass(2, "Sam", at(25, 0)),
            })
            .unwrap();

        dashboard
            .apply(DashboardEvent::LocalDeleted {
                method,
                id: 2,
                now: at(12, 0),
            })
            .unwrap();
        dashboard
            .apply(DashboardEvent::ExpirySwept { now: at(14, 0) })
            .unwrap();

        let voice = dashboard.store(method);
        assert!(voice.active().is_empty());
        assert_eq!(voice.invalid().len(), 2);
        assert_eq!(voice.next_id(), 3);
    }

    #[test]
    fn test_sweep_expires_loaded_remote_passes() {
        let mut dashboard = Dashboard::default();
        let method = Method::Qr;
        let Outcome::Issued(ticket) = dashboard.apply(DashboardEvent::LoadIssued { method }).unwrap()
        else {
            panic!("expected a ticket");
        };
        dashboard
            .apply(DashboardEvent::Loaded {
                method,
                ticket,
                records: vec![pass(1, "Guest", at(12, 13)), pass(2, "Cleaner", at(20, 0))],
                now: at(12, 9),
            })
            .unwrap();
        assert_eq!(dashboard.nearest_expiring(method).unwrap().name, "Guest");

        dashboard
            .apply(DashboardEvent::ExpirySwept { now: at(12, 17) })
            .unwrap();

        let qr = dashboard.store(method);
        assert_eq!(qr.active().len(), 1);
        assert_eq!(qr.invalid()[0].name, "Guest");
        assert_eq!(dashboard.nearest_expiring(method).unwrap().name, "Cleaner");
    }

    #[test]
    fn test_sort_events_toggle_views() {
        let mut dashboard = Dashboard::default();
        for (id, name) in [(1, "b"), (2, "A"), (3, "c")] {
            dashboard
                .apply(DashboardEvent::LocalCreated {
                    method: Method::Voice,
                    pass: pass(id, name, at(20, 0)),
                })
                .unwrap();
        }

        let names = |d: &Dashboard| -> Vec<String> {
            d.sorted_active(Method::Voice)
                .into_iter()
                .map(|p| p.name)
                .collect()
        };
        assert_eq!(names(&dashboard), vec!["A", "b", "c"]);

        dashboard
            .apply(DashboardEvent::SortActive(ActiveSortField::Name))
            .unwrap();
        assert_eq!(dashboard.active_sort().direction, SortDirection::Descending);
        assert_eq!(names(&dashboard), vec!["c", "b", "A"]);
    }

    #[test]
    fn test_notice_events() {
        let config = DashboardConfig {
            notice_policy: NoticeMergePolicy::Replace,
            ..DashboardConfig::default()
        };
        let mut dashboard = Dashboard::from_config(&config).unwrap();
        dashboard
            .apply(DashboardEvent::NoticeAdded {
                message: "Alex updated".to_string(),
                method: "Voice".to_string(),
                at: at(12, 0),
            })
            .unwrap();
        assert_eq!(dashboard.notices().len(), 1);

        let batch = vec![ActionRecord {
            action: "Door unlocked".to_string(),
            action_type: "QR Code".to_string(),
            action_time: "2025-05-12T09:00:00".to_string(),
        }];
        let pushed = |seq| DashboardEvent::NoticesPushed {
            seq,
            batch: batch.clone(),
        };
        assert_eq!(dashboard.apply(pushed(1)).unwrap(), Outcome::Applied);
        assert_eq!(dashboard.apply(pushed(1)).unwrap(), Outcome::Discarded);
        assert_eq!(dashboard.notices().latest().unwrap().message, "Door unlocked");
    }

    #[test]
    fn test_dispatch_through_shared_handle() {
        let shared = Dashboard::default().into_shared();
        dispatch(
            &shared,
            DashboardEvent::RequestStarted { method: Method::Qr },
        )
        .unwrap();
        assert!(lock(&shared).unwrap().is_loading());
    }
}
