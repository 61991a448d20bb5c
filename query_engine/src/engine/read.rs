//! Read operations

use super::{Engine, Session};
use crate::errors::ClientError;
use crate::operation::Action;
use crate::query_builder::sql_generation::SqlWriter;
use crate::query_builder::{AggregateArgs, CountArgs, FindArgs, FindUniqueArgs, GroupByArgs, Statement};
use crate::schema::ModelDef;
use serde_json::Value;

impl Engine {
    async fn fetch_all_values(&self, session: &Session, statement: &Statement) -> Result<Vec<Value>, ClientError> {
        let mut conn = self.acquire(session).await?;
        self.fetch_values(conn.get()?, statement).await
    }

    async fn fetch_one_value(&self, session: &Session, statement: &Statement) -> Result<Value, ClientError> {
        let mut conn = self.acquire(session).await?;
        self.fetch_value(conn.get()?, statement).await
    }

    pub(crate) async fn find_unique(&self, session: &Session, model: &'static ModelDef, action: Action, args: &FindUniqueArgs) -> Result<Value, ClientError> {
        let writer = SqlWriter::new(model.name, action.as_str());
        writer.unique_field(model, &args.where_)?;
        let find = FindArgs {
            filter: Some(args.where_.to_filter()),
            take: Some(1),
            selection: args.selection.clone(),
            ..FindArgs::default()
        };
        let statement = writer.find_many(model, &find)?;
        self.fetch_one_value(session, &statement).await
    }

    pub(crate) async fn find_first(&self, session: &Session, model: &'static ModelDef, action: Action, args: &FindArgs) -> Result<Value, ClientError> {
        let mut find = args.clone();
        find.take = Some(if args.take.is_some_and(|t| t < 0) { -1 } else { 1 });
        let statement = SqlWriter::new(model.name, action.as_str()).find_many(model, &find)?;
        self.fetch_one_value(session, &statement).await
    }

    pub(crate) async fn find_many(&self, session: &Session, model: &'static ModelDef, args: &FindArgs) -> Result<Value, ClientError> {
        let statement = SqlWriter::new(model.name, Action::FindMany.as_str()).find_many(model, args)?;
        Ok(Value::Array(self.fetch_all_values(session, &statement).await?))
    }

    pub(crate) async fn count(&self, session: &Session, model: &'static ModelDef, args: &CountArgs) -> Result<Value, ClientError> {
        let statement = SqlWriter::new(model.name, Action::Count.as_str()).count(model, args)?;
        self.fetch_one_value(session, &statement).await
    }

    pub(crate) async fn aggregate(&self, session: &Session, model: &'static ModelDef, args: &AggregateArgs) -> Result<Value, ClientError> {
        let statement = SqlWriter::new(model.name, Action::Aggregate.as_str()).aggregate(model, args)?;
        self.fetch_one_value(session, &statement).await
    }

    pub(crate) async fn group_by(&self, session: &Session, model: &'static ModelDef, args: &GroupByArgs) -> Result<Value, ClientError> {
        let statement = SqlWriter::new(model.name, Action::GroupBy.as_str()).group_by(model, args)?;
        Ok(Value::Array(self.fetch_all_values(session, &statement).await?))
    }
}
