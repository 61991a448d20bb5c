//! Statement execution on a single connection

use super::Engine;
use crate::errors::ClientError;
use crate::query_builder::write_sql::{Expect, WriteStep};
use crate::query_builder::Statement;
use config::{LogEmit, LogLevel};
use query_events::{ClientEvent, EventType, QueryEvent, QUERY_TARGET};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres, Row};
use std::time::Instant;
use tracing::{debug, info};
use type_mapping::{params_to_json, PostgresValue, ScalarType};
use uuid::Uuid;

// Nulls are bound with the column type so the server never has to guess it
macro_rules! bind_value {
    ($query:expr, $value:expr) => {
        match $value {
            PostgresValue::Text(s) => $query.bind(s),
            PostgresValue::Integer(i) => $query.bind(i),
            PostgresValue::BigInt(i) => $query.bind(i),
            PostgresValue::Float(f) => $query.bind(f),
            PostgresValue::Boolean(b) => $query.bind(b),
            PostgresValue::Uuid(u) => $query.bind(u),
            PostgresValue::Timestamp(t) => $query.bind(t),
            PostgresValue::TextArray(items) => $query.bind(items),
            PostgresValue::Json(v) => $query.bind(sqlx::types::Json(v)),
            PostgresValue::Null(scalar) => match scalar {
                ScalarType::String => $query.bind(Option::<String>::None),
                ScalarType::Int => $query.bind(Option::<i32>::None),
                ScalarType::Float => $query.bind(Option::<f64>::None),
                ScalarType::Boolean => $query.bind(Option::<bool>::None),
                ScalarType::DateTime => $query.bind(Option::<chrono::DateTime<chrono::Utc>>::None),
                ScalarType::Uuid => $query.bind(Option::<Uuid>::None),
                ScalarType::StringList => $query.bind(Option::<Vec<String>>::None),
            },
        }
    };
}

pub(crate) fn query_for(statement: &Statement) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = bind_value!(query, param.clone());
    }
    query
}

/// First column of a row as JSON; SQL NULL becomes `null`
fn json_column(row: &PgRow) -> Result<Value, ClientError> {
    let value: Option<Value> = row.try_get(0).map_err(ClientError::from_sqlx)?;
    Ok(value.unwrap_or(Value::Null))
}

impl Engine {
    /// Log a finished statement and publish its query event
    fn observe(&self, statement: &Statement, started: Instant) {
        let elapsed = started.elapsed();
        debug!(
            target: QUERY_TARGET,
            sql = %statement.sql,
            params = statement.params.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Statement finished"
        );
        crate::trace_log!("Bound parameters: {}", params_to_json(&statement.params));

        let config = self.config();
        if config.logs(LogLevel::Query, LogEmit::Stdout) {
            info!(
                target: QUERY_TARGET,
                "{} {} ({} ms)",
                statement.sql,
                params_to_json(&statement.params),
                elapsed.as_millis()
            );
        }
        if config.logs(LogLevel::Query, LogEmit::Event) && self.events().has_subscribers(EventType::Query) {
            self.events().emit(&ClientEvent::Query(QueryEvent::new(
                statement.sql.clone(),
                &statement.params,
                elapsed,
            )));
        }
    }

    /// Every row's JSON column
    pub(crate) async fn fetch_values(&self, conn: &mut PgConnection, statement: &Statement) -> Result<Vec<Value>, ClientError> {
        let started = Instant::now();
        let rows = query_for(statement).fetch_all(&mut *conn).await;
        self.observe(statement, started);
        rows.map_err(ClientError::from_sqlx)?
            .iter()
            .map(json_column)
            .collect()
    }

    /// The first row's JSON column, or `null` without rows
    pub(crate) async fn fetch_value(&self, conn: &mut PgConnection, statement: &Statement) -> Result<Value, ClientError> {
        let started = Instant::now();
        let row = query_for(statement).fetch_optional(&mut *conn).await;
        self.observe(statement, started);
        match row.map_err(ClientError::from_sqlx)? {
            Some(row) => json_column(&row),
            None => Ok(Value::Null),
        }
    }

    /// Rows affected by the statement
    pub(crate) async fn execute_statement(&self, conn: &mut PgConnection, statement: &Statement) -> Result<u64, ClientError> {
        let started = Instant::now();
        let result = query_for(statement).execute(&mut *conn).await;
        self.observe(statement, started);
        Ok(result.map_err(ClientError::from_sqlx)?.rows_affected())
    }

    /// Ids produced by a `RETURNING "id"` or id lookup statement
    pub(crate) async fn fetch_ids(&self, conn: &mut PgConnection, statement: &Statement) -> Result<Vec<Uuid>, ClientError> {
        let started = Instant::now();
        let rows = query_for(statement).fetch_all(&mut *conn).await;
        self.observe(statement, started);
        rows.map_err(ClientError::from_sqlx)?
            .iter()
            .map(|row| row.try_get::<Uuid, _>(0).map_err(ClientError::from_sqlx))
            .collect()
    }

    pub(crate) async fn fetch_id(&self, conn: &mut PgConnection, statement: &Statement) -> Result<Option<Uuid>, ClientError> {
        Ok(self.fetch_ids(conn, statement).await?.into_iter().next())
    }

    /// Run planned write steps in order, checking their expectations
    pub(crate) async fn run_steps(&self, conn: &mut PgConnection, steps: &[WriteStep]) -> Result<(), ClientError> {
        for step in steps {
            match &step.expect {
                Expect::Nothing => {
                    self.execute_statement(conn, &step.statement).await?;
                }
                Expect::Row(message) => {
                    let started = Instant::now();
                    let row = query_for(&step.statement).fetch_optional(&mut *conn).await;
                    self.observe(&step.statement, started);
                    if row.map_err(ClientError::from_sqlx)?.is_none() {
                        return Err(ClientError::not_found(message.clone()));
                    }
                }
                Expect::Affected(message) => {
                    if self.execute_statement(conn, &step.statement).await? == 0 {
                        return Err(ClientError::not_found(message.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}
