//! Storage layer for boards.
//!
//! The document store is the source of truth for all board data. Handlers only
//! see the `Storage` trait; `MongoStorage` is the production adapter and
//! `MemoryStorage` evaluates the same compiled plans in process.

mod memory;
mod mongo;
pub mod query;

pub use memory::MemoryStorage;
pub use mongo::MongoStorage;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, StoreBackend};
use crate::errors::AppError;
use crate::models::{Board, Filter};

/// Board persistence contract.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Apply a board create or update as one ordered bulk write.
    async fn save(&self, board: Board) -> Result<(), AppError>;

    /// Remove a board. Fails with `NotFound` when no document matched.
    async fn delete(&self, board_id: &str) -> Result<(), AppError>;

    /// One page of matching boards, newest first.
    async fn find(
        &self,
        filter: &Filter,
        page_index: u64,
        page_size: u32,
    ) -> Result<Vec<Board>, AppError>;

    /// Number of boards matching the filter.
    async fn count(&self, filter: &Filter) -> Result<u64, AppError>;
}

/// Number of documents skipped before the requested page.
pub fn page_offset(page_index: u64, page_size: u32) -> u64 {
    page_index.saturating_mul(u64::from(page_size))
}

/// Run a store operation under a deadline.
///
/// The inner future is dropped when the deadline fires, which cancels the
/// in-flight store call.
pub(crate) async fn with_deadline<T, F>(
    timeout: Duration,
    operation: impl std::fmt::Display,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| e.context(&operation)),
        Err(_) => Err(AppError::Timeout(format!(
            "{}: exceeded {}ms deadline",
            operation,
            timeout.as_millis()
        ))),
    }
}

/// Open the configured store and run its one-time index setup.
///
/// Index creation failure is returned to the caller, which must abort startup.
pub async fn init_storage(config: &Config) -> Result<Arc<dyn Storage>, AppError> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory board store; data is lost on restart");
            Ok(Arc::new(MemoryStorage::new(config.store_timeout)))
        }
        StoreBackend::MongoDb => {
            let storage = MongoStorage::connect(
                &config.mongodb_uri,
                &config.mongodb_database,
                config.store_timeout,
            )
            .await?;
            storage.ensure_indexes().await?;
            Ok(Arc::new(storage))
        }
    }
}
