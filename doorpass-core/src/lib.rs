//! DoorPass Core Library
//!
//! This library provides the pass lifecycle engine behind the door-lock
//! dashboard: Morse knock credentials, active/invalid classification,
//! sorting, the activity notice log and reconciliation with the lock's
//! remote store.

pub mod config;
pub mod morse;
pub mod notice;
pub mod pass;
pub mod push;
pub mod sort;
pub mod state;
pub mod sync;
pub mod timestamp;

pub use config::{DashboardConfig, ReconcilePolicy};
pub use morse::{encode, MorseEncoding, MorseError, MorseInput, MorseUnit};
pub use notice::{ActionRecord, Notice, NoticeLog, NoticeMergePolicy, NoticeOrigin};
pub use pass::{
    Credential, InvalidStatus, Method, MorseCredential, Pass, PassDraft, PassStore, PassType,
};
pub use push::{PushChannel, PushEvent};
pub use sort::{ActiveSortField, InvalidSortField, SortDirection, SortState};
pub use state::{Dashboard, DashboardEvent, Outcome, SharedDashboard};
pub use sync::{HttpRemote, PassRemote, SyncCoordinator};

use thiserror::Error;

/// Result type for DoorPass operations
pub type Result<T> = std::result::Result<T, DoorPassError>;

/// General error type for DoorPass operations
#[derive(Error, Debug)]
pub enum DoorPassError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote rejected request ({status}): {body}")]
    Remote { status: u16, body: String },

    #[error("Invalid Morse sequence: {0}")]
    Morse(#[from] MorseError),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dashboard state lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
