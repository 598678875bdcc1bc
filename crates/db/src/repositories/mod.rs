use async_trait::async_trait;
use thiserror::Error;

use botdesk_core::domain::request::{RequestId, SubmittedRequest};

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only store of submitted requests.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn save(&self, request: SubmittedRequest) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<SubmittedRequest>, RepositoryError>;
    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<SubmittedRequest>, RepositoryError>;
    /// Every stored request, newest first.
    async fn list_all(&self) -> Result<Vec<SubmittedRequest>, RepositoryError>;
    async fn count(&self) -> Result<u64, RepositoryError>;
}
