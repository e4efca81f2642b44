//! Synchronisation with the lock controller's pass store.
//!
//! - [`models`]: wire records and request bodies
//! - [`remote`]: the [`PassRemote`] seam
//! - [`client`]: HTTP implementation of the seam
//! - [`coordinator`]: load and mutation round trips against the dashboard state

pub mod client;
pub mod coordinator;
pub mod models;
pub mod remote;

pub use client::HttpRemote;
pub use coordinator::SyncCoordinator;
pub use models::{CreateRequest, DeleteRequest, LoadRequest, UpdateRequest, WireRecord};
pub use remote::PassRemote;
