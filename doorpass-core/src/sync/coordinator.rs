//! Sync coordinator: drives load and mutation round trips for each method.
//!
//! Remote methods mutate through the lock's endpoints and then reload the
//! full record set; the local split is always derived from the reload.
//! Local-only methods mutate the dashboard state directly.

use crate::pass::{Method, Pass, PassDraft};
use crate::state::{dispatch, lock, DashboardEvent, Outcome, SharedDashboard};
use crate::sync::models::{CreateRequest, DeleteRequest, UpdateRequest};
use crate::sync::remote::PassRemote;
use crate::timestamp;
use crate::{DoorPassError, Result};
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

/// Keeps the loading indicator raised while a remote request is in flight.
struct InFlight<'a> {
    state: &'a SharedDashboard,
    method: Method,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a SharedDashboard, method: Method) -> Result<Self> {
        dispatch(state, DashboardEvent::RequestStarted { method })?;
        Ok(Self { state, method })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let method = self.method;
        if let Err(e) = dispatch(self.state, DashboardEvent::RequestFinished { method }) {
            warn!("Could not clear {} loading state: {}", method, e);
        }
    }
}

fn logged<T>(result: Result<T>, action: &str, method: Method) -> Result<T> {
    if let Err(e) = &result {
        warn!("Failed to {} {} pass: {}", action, method, e);
    }
    result
}

/// Orchestrates remote calls and state transitions for all methods.
pub struct SyncCoordinator<R> {
    remote: R,
    state: SharedDashboard,
    clock: fn() -> NaiveDateTime,
}

impl<R: PassRemote> SyncCoordinator<R> {
    pub fn new(remote: R, state: SharedDashboard) -> Self {
        Self {
            remote,
            state,
            clock: timestamp::now,
        }
    }

    /// Replace the wall clock used for classification and notices.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &SharedDashboard {
        &self.state
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Reload after a mutation the lock already accepted. A failure here
    /// leaves the dashboard stale but does not undo the mutation.
    async fn resync(&self, method: Method) {
        if let Err(e) = self.load(method).await {
            warn!("{} change applied but reload failed: {}", method, e);
        }
    }

    fn notify(&self, message: String, method: Method) -> Result<()> {
        dispatch(
            &self.state,
            DashboardEvent::NoticeAdded {
                message,
                method: method.display_name().to_string(),
                at: self.now(),
            },
        )?;
        Ok(())
    }

    /// Fetch and reclassify the full record set of `method`.
    ///
    /// Returns [`Outcome::Discarded`] when a newer load was applied first.
    pub async fn load(&self, method: Method) -> Result<Outcome> {
        if !method.has_remote() {
            return dispatch(&self.state, DashboardEvent::ExpirySwept { now: self.now() });
        }

        let _in_flight = InFlight::start(&self.state, method)?;
        let Outcome::Issued(ticket) = dispatch(&self.state, DashboardEvent::LoadIssued { method })?
        else {
            return Err(DoorPassError::InvalidInput(format!(
                "no load ticket issued for {}",
                method
            )));
        };

        let records = logged(self.remote.load(method).await, "load", method)?;
        let total = records.len();
        let passes: Vec<Pass> = records
            .into_iter()
            .filter_map(|record| {
                let id = record.id;
                match record.into_pass(method) {
                    Ok(pass) => Some(pass),
                    Err(e) => {
                        warn!("Skipping {} record {}: {}", method, id, e);
                        None
                    }
                }
            })
            .collect();
        debug!("{} load #{} mapped {}/{} records", method, ticket, passes.len(), total);

        dispatch(
            &self.state,
            DashboardEvent::Loaded {
                method,
                ticket,
                records: passes,
                now: self.now(),
            },
        )
    }

    /// Initial population: QR then Morse, then the local stores.
    ///
    /// Every method is attempted; the first failure is returned.
    pub async fn load_all(&self) -> Result<()> {
        let mut first_error = None;
        for method in Method::ALL {
            if let Err(e) = self.load(method).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Initial load complete");
                Ok(())
            }
        }
    }

    /// Create a pass from `draft`, assigning the method's next id.
    pub async fn create(&self, method: Method, draft: PassDraft) -> Result<Pass> {
        let pass = {
            let dashboard = lock(&self.state)?;
            let id = dashboard.store(method).next_id();
            draft.into_pass(method, id)?
        };

        if method.has_remote() {
            {
                let _in_flight = InFlight::start(&self.state, method)?;
                let request = CreateRequest::new(method, &pass);
                logged(self.remote.create(&request).await, "create", method)?;
            }
            self.notify(format!("New {} created", pass.pass_type), method)?;
            self.resync(method).await;
        } else {
            dispatch(
                &self.state,
                DashboardEvent::LocalCreated {
                    method,
                    pass: pass.clone(),
                },
            )?;
            self.notify(format!("New {} created", pass.pass_type), method)?;
        }

        info!("Created {} pass {} ({})", method, pass.id, pass.name);
        Ok(pass)
    }

    /// Save an edited pass.
    ///
    /// For remote methods only the fields that differ from the last loaded
    /// version are sent; an edit that changes nothing is not sent at all.
    pub async fn update(&self, method: Method, edited: Pass) -> Result<()> {
        let mut edited = edited;
        edited.enforce_method_rules(method);

        if method.has_remote() {
            let confirmed = lock(&self.state)?
                .store(method)
                .find_active(edited.id)
                .cloned();
            let request = UpdateRequest::diff(method, confirmed.as_ref(), &edited);
            if request.is_noop() {
                debug!("{} pass {} unchanged, nothing to send", method, edited.id);
                return Ok(());
            }
            {
                let _in_flight = InFlight::start(&self.state, method)?;
                logged(self.remote.update(&request).await, "update", method)?;
            }
            self.notify(format!("{} updated", edited.name), method)?;
            self.resync(method).await;
        } else {
            let name = edited.name.clone();
            dispatch(&self.state, DashboardEvent::LocalUpdated { method, pass: edited })?;
            self.notify(format!("{} updated", name), method)?;
        }
        Ok(())
    }

    /// Delete pass `id`. Remote methods delete on the lock; local methods
    /// soft-delete.
    pub async fn delete(&self, method: Method, id: u64) -> Result<()> {
        let name = lock(&self.state)?
            .store(method)
            .find_active(id)
            .map(|pass| pass.name.clone());

        if method.has_remote() {
            {
                let _in_flight = InFlight::start(&self.state, method)?;
                let request = DeleteRequest { id, method };
                logged(self.remote.delete(&request).await, "delete", method)?;
            }
            let name = name.unwrap_or_else(|| format!("Pass {}", id));
            self.notify(format!("{} deleted", name), method)?;
            self.resync(method).await;
        } else {
            let name = name.ok_or_else(|| {
                DoorPassError::NotFound(format!("active {} pass {}", method, id))
            })?;
            dispatch(
                &self.state,
                DashboardEvent::LocalDeleted {
                    method,
                    id,
                    now: self.now(),
                },
            )?;
            self.notify(format!("{} deleted", name), method)?;
        }
        Ok(())
    }

    /// QR image bytes for pass `id`.
    pub async fn qr_image(&self, id: u64) -> Result<Vec<u8>> {
        logged(self.remote.qr_image(id).await, "fetch image of", Method::Qr)
    }
}
