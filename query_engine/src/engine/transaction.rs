//! Interactive and batch transactions

use super::Engine;
use crate::errors::ClientError;
use config::{LogLevel, TransactionConfig};
use query_events::EventType;
use sqlx::{Postgres, Transaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn to_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// How long to wait for a connection to begin on
    pub max_wait: Duration,
    /// How long the whole transaction may run before it is rolled back
    pub timeout: Duration,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self::from_config(&TransactionConfig::default())
    }
}

impl TransactionOptions {
    pub fn from_config(config: &TransactionConfig) -> Self {
        Self {
            max_wait: Duration::from_millis(config.max_wait_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            isolation_level: None,
        }
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }
}

pub(crate) fn closed_error() -> ClientError {
    ClientError::transaction(
        "Transaction already closed: the transaction was committed, rolled back or timed out.",
    )
}

pub(crate) fn expired_error(timeout: Duration) -> ClientError {
    ClientError::transaction(format!(
        "Transaction already closed: A commit cannot be executed on an expired transaction. The timeout for this transaction was {} ms.",
        timeout.as_millis()
    ))
}

/// An open transaction shared by the operations of one transaction scope.
/// Once committed or rolled back, every further use fails with P2028.
#[derive(Clone)]
pub struct TransactionHandle {
    tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle").finish_non_exhaustive()
    }
}

impl TransactionHandle {
    pub(crate) async fn lock(&self) -> Result<OwnedMutexGuard<Option<Transaction<'static, Postgres>>>, ClientError> {
        let guard = Arc::clone(&self.tx).lock_owned().await;
        if guard.is_none() {
            return Err(closed_error());
        }
        Ok(guard)
    }

    pub(crate) async fn commit(&self) -> Result<(), ClientError> {
        let tx = self.tx.lock().await.take().ok_or_else(closed_error)?;
        tx.commit().await.map_err(ClientError::from_sqlx)
    }

    /// Roll back if still open; failures are only logged
    pub(crate) async fn rollback(&self, engine: &Engine) {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            if let Err(err) = tx.rollback().await {
                warn!("Transaction rollback failed: {}", err);
                engine.report(
                    EventType::Warn,
                    LogLevel::Warn,
                    &format!("Transaction rollback failed: {}", err),
                );
            }
        }
    }
}

/// Run `start` within `max_wait`, failing with P2028 once it elapses
async fn within_max_wait<T>(
    max_wait: Duration,
    start: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    match tokio::time::timeout(max_wait, start).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::transaction(format!(
            "Unable to start a transaction in the given time ({} ms).",
            max_wait.as_millis()
        ))),
    }
}

impl Engine {
    /// Begin a transaction within `max_wait`, reconnecting first if needed
    pub async fn begin(&self, options: &TransactionOptions) -> Result<TransactionHandle, ClientError> {
        let mut tx = within_max_wait(options.max_wait, async {
            let pool = self.connect().await?;
            pool.begin().await.map_err(ClientError::from_sqlx)
        })
        .await?;
        if let Some(level) = options.isolation_level {
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", level.to_sql());
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .map_err(ClientError::from_sqlx)?;
        }
        crate::debug_log!("Transaction started with {:?}", options);
        Ok(TransactionHandle {
            tx: Arc::new(Mutex::new(Some(tx))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let options = TransactionOptions::from_config(&TransactionConfig {
            max_wait_ms: 250,
            timeout_ms: 1500,
        });
        assert_eq!(options.max_wait, Duration::from_millis(250));
        assert_eq!(options.timeout, Duration::from_millis(1500));
        assert_eq!(options.isolation_level, None);

        let options = options.isolation_level(IsolationLevel::Serializable);
        assert_eq!(options.isolation_level.map(|l| l.to_sql()), Some("SERIALIZABLE"));
    }

    #[test]
    fn test_default_budgets() {
        let options = TransactionOptions::default();
        assert_eq!(options.max_wait, Duration::from_secs(2));
        assert_eq!(options.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_closed_errors_use_transaction_code() {
        assert_eq!(closed_error().code(), Some("P2028"));
        let err = expired_error(Duration::from_millis(5000));
        assert!(err.to_string().contains("5000 ms"));
    }

    #[tokio::test]
    async fn test_start_is_bounded_by_max_wait() {
        let started = std::time::Instant::now();
        let err = within_max_wait(
            Duration::from_millis(20),
            std::future::pending::<Result<(), ClientError>>(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some("P2028"));
        assert!(err.to_string().contains("20 ms"));
        assert!(started.elapsed() < Duration::from_secs(2));

        let err = within_max_wait(Duration::from_secs(1), async {
            Err::<(), _>(ClientError::initialization("P1001", "unreachable"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some("P1001"));
    }
}
