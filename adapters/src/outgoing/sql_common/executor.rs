use std::{future::Future, time::Duration};
use tokio::time::timeout;

use warpstore_application::error::{AppError, AppResult};

/// Runs driver futures and maps their failures onto the storage error
/// taxonomy, optionally bounded by a statement timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementExecutor {
    timeout: Option<Duration>,
}

impl StatementExecutor {
    /// `None` leaves timeouts to the driver.
    pub fn new(timeout_secs: Option<u64>) -> Self {
        Self {
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    pub async fn execute_with_timeout<T, Fut>(&self, operation: Fut, error_context: &str) -> AppResult<T>
    where
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let result = match self.timeout {
            Some(limit) => timeout(limit, operation)
                .await
                .map_err(|_| AppError::ConnectionFailure {
                    message: format!("{error_context}: statement timed out after {limit:?}"),
                })?,
            None => operation.await,
        };

        result.map_err(|e| map_sqlx_error(e, error_context))
    }
}

pub fn map_sqlx_error(error: sqlx::Error, error_context: &str) -> AppError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::ConnectionFailure {
            message: format!("{error_context}: {error}"),
        },
        other => AppError::StorageError {
            message: format!("{error_context}: {other}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn maps_pool_errors_to_connection_failures() {
        let executor = StatementExecutor::new(None);
        let result: AppResult<()> = executor
            .execute_with_timeout(async { Err(sqlx::Error::PoolClosed) }, "Failed to load warps")
            .await;

        assert!(matches!(result, Err(AppError::ConnectionFailure { .. })));
    }

    #[tokio::test]
    async fn maps_statement_errors_to_storage_errors() {
        let executor = StatementExecutor::new(None);
        let result: AppResult<()> = executor
            .execute_with_timeout(async { Err(sqlx::Error::RowNotFound) }, "Failed to create warp")
            .await;

        match result {
            Err(AppError::StorageError { message }) => {
                assert!(message.starts_with("Failed to create warp: "));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_slow_statements() {
        let executor = StatementExecutor::new(Some(1));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, sqlx::Error>(())
        };

        let result = executor.execute_with_timeout(slow, "Failed to update visits").await;

        assert!(matches!(result, Err(AppError::ConnectionFailure { .. })));
    }
}
