//! Seam between the coordinator and the lock's pass endpoints.

use crate::pass::Method;
use crate::sync::models::{CreateRequest, DeleteRequest, UpdateRequest, WireRecord};
use crate::Result;
use async_trait::async_trait;

/// Remote pass store for methods the lock persists.
#[async_trait]
pub trait PassRemote: Send + Sync {
    /// Fetch the full record set of `method`, deleted and expired included.
    async fn load(&self, method: Method) -> Result<Vec<WireRecord>>;

    async fn create(&self, request: &CreateRequest) -> Result<()>;

    async fn update(&self, request: &UpdateRequest) -> Result<()>;

    async fn delete(&self, request: &DeleteRequest) -> Result<()>;

    /// Rendered QR image for pass `id`.
    async fn qr_image(&self, id: u64) -> Result<Vec<u8>>;
}
