//! Activity notice log.
//!
//! The log holds at most `capacity` notices, newest first. It is fed from
//! two directions: the dashboard prepends a notice after each management
//! action, and the lock controller pushes its whole action history which
//! replaces the stored sequence.

use crate::timestamp::parse_timestamp;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default number of notices kept.
pub const NOTICE_CAPACITY: usize = 20;

/// Action record delivered by the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: String,
    pub action_type: String,
    pub action_time: String,
}

/// Where a notice came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeOrigin {
    Local,
    Pushed,
}

/// How a pushed batch combines with notices added locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeMergePolicy {
    /// The pushed batch replaces everything.
    #[default]
    Replace,
    /// Local notices newer than the newest pushed action survive.
    KeepUnacknowledgedLocal,
}

/// One entry in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: u64,
    pub date: String,
    pub time: String,
    pub message: String,
    pub method: String,
    pub at: NaiveDateTime,
    pub origin: NoticeOrigin,
}

/// Result of offering a pushed batch to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Applied { kept: usize },
    Stale,
}

/// Bounded, newest-first notice sequence.
#[derive(Debug, Clone)]
pub struct NoticeLog {
    entries: Vec<Notice>,
    capacity: usize,
    policy: NoticeMergePolicy,
    applied_batch: u64,
}

impl Default for NoticeLog {
    fn default() -> Self {
        Self::new(NOTICE_CAPACITY, NoticeMergePolicy::default())
    }
}

impl NoticeLog {
    pub fn new(capacity: usize, policy: NoticeMergePolicy) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            policy,
            applied_batch: 0,
        }
    }

    pub fn entries(&self) -> &[Notice] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.entries.first()
    }

    fn next_id(&self) -> u64 {
        self.entries
            .iter()
            .map(|notice| notice.id)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    /// Prepend a locally generated notice.
    pub fn add(&mut self, message: &str, method: &str, at: NaiveDateTime) -> &Notice {
        let notice = Notice {
            id: self.next_id(),
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M").to_string(),
            message: message.to_string(),
            method: method.to_string(),
            at,
            origin: NoticeOrigin::Local,
        };
        self.entries.insert(0, notice);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Apply a pushed action batch.
    ///
    /// `batch_seq` numbers deliveries on one push connection; a batch not
    /// newer than the last applied one is discarded.
    pub fn apply_push(&mut self, batch_seq: u64, records: &[ActionRecord]) -> PushOutcome {
        if batch_seq <= self.applied_batch {
            debug!(
                "Discarding push batch #{} (applied #{})",
                batch_seq, self.applied_batch
            );
            return PushOutcome::Stale;
        }
        self.applied_batch = batch_seq;

        let mut pushed: Vec<Notice> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| pushed_notice(index, record))
            .collect();
        pushed.sort_by(|a, b| b.at.cmp(&a.at));

        let mut entries: Vec<Notice> = match self.policy {
            NoticeMergePolicy::Replace => Vec::new(),
            NoticeMergePolicy::KeepUnacknowledgedLocal => {
                let newest_pushed = pushed.first().map(|notice| notice.at);
                self.entries
                    .iter()
                    .filter(|notice| notice.origin == NoticeOrigin::Local)
                    .filter(|notice| newest_pushed.map_or(true, |newest| notice.at > newest))
                    .cloned()
                    .collect()
            }
        };

        // Pushed ids continue after the kept local ones
        let offset = entries.iter().map(|notice| notice.id).max().unwrap_or(0);
        for notice in &mut pushed {
            notice.id = notice.id.saturating_add(offset);
        }
        entries.extend(pushed);
        entries.truncate(self.capacity);
        self.entries = entries;

        PushOutcome::Applied {
            kept: self.entries.len(),
        }
    }
}

fn pushed_notice(index: usize, record: &ActionRecord) -> Option<Notice> {
    let at = match parse_timestamp(&record.action_time) {
        Ok(at) => at,
        Err(e) => {
            warn!("Skipping pushed action {:?}: {}", record.action, e);
            return None;
        }
    };

    Some(Notice {
        id: index as u64 + 1,
        date: at.format("%Y-%m-%d").to_string(),
        time: at.format("%H:%M:%S").to_string(),
        message: record.action.clone(),
        method: record.action_type.clone(),
        at,
        origin: NoticeOrigin::Pushed,
    })
}
