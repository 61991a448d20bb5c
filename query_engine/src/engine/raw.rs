//! Raw SQL escape hatches

use super::{Engine, Session};
use crate::errors::ClientError;
use crate::query_builder::Statement;
use query_events::EventType;
use config::LogLevel;
use serde_json::Value;
use type_mapping::{infer_postgres_value, PostgresValue};

/// SQL text with positional parameters
///
/// ```
/// use query_engine::RawSql;
///
/// let raw = RawSql::new("SELECT * FROM \"Product\" WHERE \"price\" > ")
///     .bind(10.0)
///     .push(" AND \"status\" = ")
///     .bind("active");
/// assert_eq!(raw.sql(), "SELECT * FROM \"Product\" WHERE \"price\" > $1 AND \"status\" = $2");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSql {
    sql: String,
    params: Vec<PostgresValue>,
}

impl RawSql {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append SQL text verbatim
    pub fn push(mut self, sql: &str) -> Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a placeholder bound to `value`
    pub fn bind(mut self, value: impl Into<PostgresValue>) -> Self {
        self.params.push(value.into());
        self.sql.push_str(&format!("${}", self.params.len()));
        self
    }

    /// SQL already containing `$n` placeholders; bind types are inferred
    /// from the JSON values
    pub fn unchecked(sql: impl Into<String>, params: &[Value]) -> Self {
        Self {
            sql: sql.into(),
            params: params.iter().map(infer_postgres_value).collect(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[PostgresValue] {
        &self.params
    }

    fn into_statement(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }

    /// Wrap a row-returning query so each row comes back as one JSON object
    fn into_json_rows(self) -> Statement {
        let sql = self.sql.trim().trim_end_matches(';').trim_end().to_string();
        Statement {
            sql: format!(
                "WITH raw_rows AS ({}) SELECT to_jsonb(raw_rows) FROM raw_rows",
                sql
            ),
            params: self.params,
        }
    }
}

impl Engine {
    fn report_raw(&self, err: &ClientError) {
        self.report(EventType::Error, LogLevel::Error, &format!("raw query: {}", err));
    }

    /// Run a statement, returning the number of affected rows
    pub async fn execute_raw(&self, session: &Session, raw: RawSql) -> Result<u64, ClientError> {
        let statement = raw.into_statement();
        let result = async {
            let mut conn = self.acquire(session).await?;
            self.execute_statement(conn.get()?, &statement).await
        }
        .await;
        if let Err(err) = &result {
            self.report_raw(err);
        }
        result
    }

    /// Run a query, returning each row as a JSON object keyed by column
    pub async fn query_raw(&self, session: &Session, raw: RawSql) -> Result<Vec<Value>, ClientError> {
        let statement = raw.into_json_rows();
        let result = async {
            let mut conn = self.acquire(session).await?;
            self.fetch_values(conn.get()?, &statement).await
        }
        .await;
        if let Err(err) = &result {
            self.report_raw(err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_bind_numbers_placeholders() {
        let id = Uuid::new_v4();
        let raw = RawSql::new("UPDATE \"Product\" SET \"sold\" = \"sold\" + ")
            .bind(1)
            .push(" WHERE \"id\" = ")
            .bind(id);
        assert_eq!(
            raw.sql(),
            "UPDATE \"Product\" SET \"sold\" = \"sold\" + $1 WHERE \"id\" = $2"
        );
        assert_eq!(raw.params(), &[PostgresValue::Integer(1), PostgresValue::Uuid(id)]);
    }

    #[test]
    fn test_unchecked_infers_types() {
        let raw = RawSql::unchecked(
            "SELECT * FROM \"User\" WHERE \"name\" = $1 AND \"createdAt\" > $2",
            &[json!("Ada"), json!("2024-01-01T00:00:00Z")],
        );
        assert!(matches!(raw.params()[0], PostgresValue::Text(_)));
        assert!(matches!(raw.params()[1], PostgresValue::Timestamp(_)));
    }

    #[test]
    fn test_query_rows_wrapped_as_json() {
        let statement = RawSql::new("SELECT 1 AS one;  ").into_json_rows();
        assert_eq!(
            statement.sql,
            "WITH raw_rows AS (SELECT 1 AS one) SELECT to_jsonb(raw_rows) FROM raw_rows"
        );
    }
}
