//! Query execution
//!
//! The engine owns the connection pool, compiles operation arguments with
//! the query builder and runs the resulting statements, either on a pooled
//! connection or inside an open transaction.

mod executor;
pub mod raw;
mod read;
pub mod transaction;
mod write;

pub use raw::RawSql;
pub use transaction::{IsolationLevel, TransactionHandle, TransactionOptions};
pub(crate) use transaction::expired_error;

use crate::errors::ClientError;
use crate::operation::{Action, OperationParams, QueryArgs};
use config::{AppConfig, LogEmit, LogLevel};
use query_events::{ClientEvent, EventBus, EventType};
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

const ENGINE_TARGET: &str = "shopdb::engine";

struct EngineInner {
    config: AppConfig,
    pool: Mutex<Option<PgPool>>,
    events: Arc<EventBus>,
}

/// Shared handle to the pool, configuration and event bus
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.inner.config.database.database)
            .field("events", &self.inner.events)
            .finish()
    }
}

/// Where statements of an operation run
#[derive(Debug, Clone)]
pub enum Session {
    Pool,
    Transaction(TransactionHandle),
}

/// A connection checked out for one operation
pub(crate) enum Conn {
    Pooled(PoolConnection<Postgres>),
    Transaction(OwnedMutexGuard<Option<Transaction<'static, Postgres>>>),
}

impl Conn {
    pub(crate) fn get(&mut self) -> Result<&mut PgConnection, ClientError> {
        match self {
            Conn::Pooled(conn) => Ok(&mut **conn),
            Conn::Transaction(guard) => (**guard)
                .as_mut()
                .map(|tx| &mut **tx)
                .ok_or_else(transaction::closed_error),
        }
    }
}

impl Engine {
    pub fn new(config: AppConfig) -> Self {
        Self::with_events(config, Arc::new(EventBus::new()))
    }

    pub fn with_events(config: AppConfig, events: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                pool: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Open the pool unless it is already open
    pub async fn connect(&self) -> Result<PgPool, ClientError> {
        let mut pool = self.inner.pool.lock().await;
        if let Some(existing) = pool.as_ref().filter(|p| !p.is_closed()) {
            return Ok(existing.clone());
        }

        let database = &self.inner.config.database;
        let opened = PgPoolOptions::new()
            .min_connections(database.min_connections)
            .max_connections(database.max_connections)
            .acquire_timeout(Duration::from_secs(database.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(database.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(database.max_lifetime_seconds))
            .connect(&database.connection_string())
            .await
            .map_err(ClientError::from_connect_error);

        let opened = match opened {
            Ok(opened) => opened,
            Err(err) => {
                self.report(EventType::Error, LogLevel::Error, &err.to_string());
                return Err(err);
            }
        };
        self.report(
            EventType::Info,
            LogLevel::Info,
            &format!(
                "Connected to database '{}' (max {} connections)",
                database.database, database.max_connections
            ),
        );
        *pool = Some(opened.clone());
        Ok(opened)
    }

    /// Close the pool; the next operation reconnects
    pub async fn disconnect(&self) {
        let pool = self.inner.pool.lock().await.take();
        if let Some(pool) = pool {
            pool.close().await;
            self.report(EventType::Info, LogLevel::Info, "Disconnected from database");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner
            .pool
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.is_closed())
    }

    pub(crate) async fn acquire(&self, session: &Session) -> Result<Conn, ClientError> {
        match session {
            Session::Pool => {
                let pool = self.connect().await?;
                let conn = pool.acquire().await.map_err(ClientError::from_sqlx)?;
                Ok(Conn::Pooled(conn))
            }
            Session::Transaction(handle) => Ok(Conn::Transaction(handle.lock().await?)),
        }
    }

    /// Route a log line to tracing and/or subscribers, as configured
    pub(crate) fn report(&self, event_type: EventType, level: LogLevel, message: &str) {
        let config = &self.inner.config;
        if config.logs(level, LogEmit::Stdout) {
            match level {
                LogLevel::Error => error!(target: ENGINE_TARGET, "{}", message),
                LogLevel::Warn => tracing::warn!(target: ENGINE_TARGET, "{}", message),
                _ => info!(target: ENGINE_TARGET, "{}", message),
            }
        } else {
            debug!(target: ENGINE_TARGET, "{}", message);
        }
        if config.logs(level, LogEmit::Event) {
            self.inner
                .events
                .emit(&ClientEvent::log(event_type, message, ENGINE_TARGET));
        }
    }

    /// Run one operation and shape its result
    pub async fn execute(&self, session: &Session, params: OperationParams) -> Result<Value, ClientError> {
        let OperationParams {
            model,
            action,
            args,
            data_path,
            ..
        } = params;
        crate::debug_log!("Executing {}.{}", model.name, action);

        let result = self.run(session, model, action, args).await.and_then(|value| {
            if value.is_null()
                && matches!(action, Action::FindUniqueOrThrow | Action::FindFirstOrThrow)
            {
                return Err(ClientError::not_found("No record was found for a query."));
            }
            Ok(descend(value, &data_path))
        });

        if let Err(err) = &result {
            if !err.is_validation() {
                self.report(
                    EventType::Error,
                    LogLevel::Error,
                    &format!("{}.{}: {}", model.name, action, err),
                );
            }
        }
        result
    }

    async fn run(
        &self,
        session: &Session,
        model: &'static crate::schema::ModelDef,
        action: Action,
        args: QueryArgs,
    ) -> Result<Value, ClientError> {
        match (action, args) {
            (Action::FindUnique | Action::FindUniqueOrThrow, QueryArgs::FindUnique(args)) => {
                self.find_unique(session, model, action, &args).await
            }
            (Action::FindFirst | Action::FindFirstOrThrow, QueryArgs::Find(args)) => {
                self.find_first(session, model, action, &args).await
            }
            (Action::FindMany, QueryArgs::Find(args)) => self.find_many(session, model, &args).await,
            (Action::Create, QueryArgs::Create(args)) => self.create(session, model, &args).await,
            (Action::CreateMany, QueryArgs::CreateMany(args)) => {
                self.create_many(session, model, &args).await
            }
            (Action::CreateManyAndReturn, QueryArgs::CreateMany(args)) => {
                self.create_many_and_return(session, model, &args).await
            }
            (Action::Update, QueryArgs::Update(args)) => self.update(session, model, &args).await,
            (Action::UpdateMany, QueryArgs::UpdateMany(args)) => {
                self.update_many(session, model, &args).await
            }
            (Action::UpdateManyAndReturn, QueryArgs::UpdateMany(args)) => {
                self.update_many_and_return(session, model, &args).await
            }
            (Action::Upsert, QueryArgs::Upsert(args)) => self.upsert(session, model, &args).await,
            (Action::Delete, QueryArgs::Delete(args)) => self.delete(session, model, &args).await,
            (Action::DeleteMany, QueryArgs::DeleteMany(args)) => {
                self.delete_many(session, model, &args).await
            }
            (Action::Count, QueryArgs::Count(args)) => self.count(session, model, &args).await,
            (Action::Aggregate, QueryArgs::Aggregate(args)) => {
                self.aggregate(session, model, &args).await
            }
            (Action::GroupBy, QueryArgs::GroupBy(args)) => self.group_by(session, model, &args).await,
            (action, args) => Err(ClientError::validation(
                model.name,
                action.as_str(),
                format!("`{}` arguments cannot be used with `{}`.", args.kind(), action),
            )),
        }
    }
}

/// Walk the relations of a fluent access; a missing parent yields null
fn descend(mut value: Value, path: &[String]) -> Value {
    for segment in path {
        value = match value {
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    value
}
