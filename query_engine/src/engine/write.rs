//! Write operations
//!
//! Arguments are compiled before a connection is taken, so invalid calls
//! fail without touching the store. Every multi-statement write runs in
//! its own transaction, or in a savepoint when a transaction is open.

use super::{Engine, Session};
use crate::errors::ClientError;
use crate::operation::Action;
use crate::query_builder::sql_generation::SqlWriter;
use crate::query_builder::write_sql::{self, WriteContext};
use crate::query_builder::{
    CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs, FindArgs, QueryFilter, Selection, Statement, UniqueWhere,
    UpdateArgs, UpdateManyArgs, UpsertArgs, UuidFilter,
};
use crate::schema::ModelDef;
use serde_json::{json, Value};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use uuid::Uuid;

/// Ids per read-back statement
const READ_BACK_CHUNK: usize = 10_000;

fn count_payload(count: u64) -> Value {
    json!({ "count": count })
}

/// Statement reading one row by primary key with the caller's selection
fn read_by_id(model: &'static ModelDef, action: Action, id: Uuid, selection: &Selection) -> Result<Statement, ClientError> {
    let find = FindArgs {
        filter: Some(UniqueWhere::new(model.id_field().name, id).to_filter()),
        take: Some(1),
        selection: selection.clone(),
        ..FindArgs::default()
    };
    SqlWriter::new(model.name, action.as_str()).find_many(model, &find)
}

/// Statements reading rows by primary key, chunked
fn read_by_ids(model: &'static ModelDef, action: Action, ids: &[Uuid], selection: &Selection) -> Result<Vec<Statement>, ClientError> {
    let id = model.id_field().name;
    let mut statements = Vec::with_capacity(ids.len() / READ_BACK_CHUNK + 1);
    let chunks: Vec<&[Uuid]> = if ids.is_empty() {
        vec![ids]
    } else {
        ids.chunks(READ_BACK_CHUNK).collect()
    };
    for chunk in chunks {
        let find = FindArgs {
            filter: Some(QueryFilter::field(id, UuidFilter::new().in_(chunk.iter().copied()))),
            selection: selection.clone(),
            ..FindArgs::default()
        };
        statements.push(SqlWriter::new(model.name, action.as_str()).find_many(model, &find)?);
    }
    Ok(statements)
}

/// `selection` with the primary key added when it would not be returned;
/// the flag says whether the key must be stripped from the rows again
fn keyed_selection(model: &ModelDef, selection: &Selection) -> (Selection, bool) {
    let id = model.id_field().name;
    let mut keyed = selection.clone();
    let mut added = false;
    if let Some(select) = keyed.select.as_mut() {
        if !select.fields.iter().any(|f| f == id) {
            select.fields.push(id.to_string());
            added = true;
        }
    }
    if keyed.omit.iter().any(|f| f == id) {
        keyed.omit.retain(|f| f != id);
        added = true;
    }
    (keyed, added)
}

/// Put read-back rows in the order their ids were written
fn in_write_order(model: &ModelDef, ids: &[Uuid], mut rows: Vec<Value>, strip_id: bool) -> Vec<Value> {
    let positions: HashMap<String, usize> = ids
        .iter()
        .enumerate()
        .map(|(position, id)| (id.to_string(), position))
        .collect();
    let id = model.id_field().name;
    rows.sort_by_key(|row| {
        row.get(id)
            .and_then(Value::as_str)
            .and_then(|key| positions.get(key).copied())
    });
    if strip_id {
        for row in &mut rows {
            if let Value::Object(map) = row {
                map.remove(id);
            }
        }
    }
    rows
}

impl Engine {
    async fn read_back(&self, conn: &mut PgConnection, statements: &[Statement]) -> Result<Vec<Value>, ClientError> {
        let mut rows = Vec::new();
        for statement in statements {
            rows.extend(self.fetch_values(conn, statement).await?);
        }
        Ok(rows)
    }

    pub(crate) async fn create(&self, session: &Session, model: &'static ModelDef, args: &CreateArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::Create.as_str());
        let (id, steps) = write_sql::plan_create(&ctx, model, &args.data)?;
        let read = read_by_id(model, Action::Create, id, &args.selection)?;

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        self.run_steps(&mut tx, &steps).await?;
        let row = self.fetch_value(&mut tx, &read).await?;
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(row)
    }

    pub(crate) async fn create_many(&self, session: &Session, model: &'static ModelDef, args: &CreateManyArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::CreateMany.as_str());
        let statements = write_sql::create_many(&ctx, model, args, false)?;
        if statements.is_empty() {
            return Ok(count_payload(0));
        }

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        let mut count = 0;
        for statement in &statements {
            count += self.execute_statement(&mut tx, statement).await?;
        }
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(count_payload(count))
    }

    pub(crate) async fn create_many_and_return(&self, session: &Session, model: &'static ModelDef, args: &CreateManyArgs) -> Result<Value, ClientError> {
        let action = Action::CreateManyAndReturn;
        let ctx = WriteContext::new(model, action.as_str());
        let statements = write_sql::create_many(&ctx, model, args, true)?;
        read_by_ids(model, action, &[], &args.selection)?;
        if statements.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        let mut ids = Vec::new();
        for statement in &statements {
            ids.extend(self.fetch_ids(&mut tx, statement).await?);
        }
        let (keyed, strip_id) = keyed_selection(model, &args.selection);
        let reads = read_by_ids(model, action, &ids, &keyed)?;
        let rows = self.read_back(&mut tx, &reads).await?;
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(Value::Array(in_write_order(model, &ids, rows, strip_id)))
    }

    pub(crate) async fn update(&self, session: &Session, model: &'static ModelDef, args: &UpdateArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::Update.as_str());
        write_sql::plan_update(&ctx, model, Uuid::nil(), &args.data)?;
        let lookup = write_sql::lookup_for_update(&ctx, model, &args.where_)?;
        read_by_id(model, Action::Update, Uuid::nil(), &args.selection)?;

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        let id = self
            .fetch_id(&mut tx, &lookup)
            .await?
            .ok_or_else(|| ClientError::not_found("Record to update not found."))?;
        let steps = write_sql::plan_update(&ctx, model, id, &args.data)?;
        self.run_steps(&mut tx, &steps).await?;
        let row = self
            .fetch_value(&mut tx, &read_by_id(model, Action::Update, id, &args.selection)?)
            .await?;
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(row)
    }

    pub(crate) async fn update_many(&self, session: &Session, model: &'static ModelDef, args: &UpdateManyArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::UpdateMany.as_str());
        let statement = write_sql::update_many(&ctx, model, args, false)?;
        let mut conn = self.acquire(session).await?;
        let count = self.execute_statement(conn.get()?, &statement).await?;
        Ok(count_payload(count))
    }

    pub(crate) async fn update_many_and_return(&self, session: &Session, model: &'static ModelDef, args: &UpdateManyArgs) -> Result<Value, ClientError> {
        let action = Action::UpdateManyAndReturn;
        let ctx = WriteContext::new(model, action.as_str());
        let statement = write_sql::update_many(&ctx, model, args, true)?;
        read_by_ids(model, action, &[], &args.selection)?;

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        let ids = self.fetch_ids(&mut tx, &statement).await?;
        let reads = read_by_ids(model, action, &ids, &args.selection)?;
        let rows = self.read_back(&mut tx, &reads).await?;
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(Value::Array(rows))
    }

    pub(crate) async fn upsert(&self, session: &Session, model: &'static ModelDef, args: &UpsertArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::Upsert.as_str());
        write_sql::plan_update(&ctx, model, Uuid::nil(), &args.update)?;
        let (created_id, create_steps) = write_sql::plan_create(&ctx, model, &args.create)?;
        let lookup = write_sql::lookup_for_update(&ctx, model, &args.where_)?;
        read_by_id(model, Action::Upsert, Uuid::nil(), &args.selection)?;

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        let id = match self.fetch_id(&mut tx, &lookup).await? {
            Some(id) => {
                let steps = write_sql::plan_update(&ctx, model, id, &args.update)?;
                self.run_steps(&mut tx, &steps).await?;
                id
            }
            None => {
                self.run_steps(&mut tx, &create_steps).await?;
                created_id
            }
        };
        let row = self
            .fetch_value(&mut tx, &read_by_id(model, Action::Upsert, id, &args.selection)?)
            .await?;
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(row)
    }

    pub(crate) async fn delete(&self, session: &Session, model: &'static ModelDef, args: &DeleteArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::Delete.as_str());
        let lookup = write_sql::lookup_for_update(&ctx, model, &args.where_)?;
        read_by_id(model, Action::Delete, Uuid::nil(), &args.selection)?;

        let mut conn = self.acquire(session).await?;
        let mut tx = conn.get()?.begin().await.map_err(ClientError::from_sqlx)?;
        let id = self
            .fetch_id(&mut tx, &lookup)
            .await?
            .ok_or_else(|| ClientError::not_found("Record to delete does not exist."))?;
        let prior = self
            .fetch_value(&mut tx, &read_by_id(model, Action::Delete, id, &args.selection)?)
            .await?;
        self.execute_statement(&mut tx, &write_sql::delete_by_id(&ctx, model, id))
            .await?;
        tx.commit().await.map_err(ClientError::from_sqlx)?;
        Ok(prior)
    }

    pub(crate) async fn delete_many(&self, session: &Session, model: &'static ModelDef, args: &DeleteManyArgs) -> Result<Value, ClientError> {
        let ctx = WriteContext::new(model, Action::DeleteMany.as_str());
        let statement = write_sql::delete_many(&ctx, model, args)?;
        let mut conn = self.acquire(session).await?;
        let count = self.execute_statement(conn.get()?, &statement).await?;
        Ok(count_payload(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::Selectable;
    use crate::schema::{AutoValue, FieldDef};
    use type_mapping::ScalarType;

    static ITEM: ModelDef = ModelDef {
        name: "Item",
        table: "Item",
        fields: &[
            FieldDef {
                name: "id",
                scalar: ScalarType::Uuid,
                nullable: false,
                is_id: true,
                is_unique: false,
                has_default: false,
                auto: AutoValue::Uuid,
            },
            FieldDef {
                name: "label",
                scalar: ScalarType::String,
                nullable: false,
                is_id: false,
                is_unique: false,
                has_default: false,
                auto: AutoValue::None,
            },
        ],
        relations: &[],
    };

    #[test]
    fn test_read_back_chunks_ids() {
        let ids: Vec<Uuid> = (0..READ_BACK_CHUNK + 1).map(|_| Uuid::new_v4()).collect();
        let statements = read_by_ids(&ITEM, Action::CreateManyAndReturn, &ids, &Selection::default()).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].params.len(), READ_BACK_CHUNK);
        assert_eq!(statements[1].params.len(), 1);
    }

    #[test]
    fn test_read_back_without_ids_validates_selection() {
        let statements = read_by_ids(&ITEM, Action::UpdateManyAndReturn, &[], &Selection::default()).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].params.is_empty());

        let bad = Selection {
            omit: vec!["missing".to_string()],
            ..Selection::default()
        };
        assert!(read_by_ids(&ITEM, Action::UpdateManyAndReturn, &[], &bad)
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_rows_follow_write_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let rows = vec![
            json!({ "id": second.to_string(), "label": "b" }),
            json!({ "id": first.to_string(), "label": "a" }),
        ];
        let ordered = in_write_order(&ITEM, &[first, second], rows, false);
        assert_eq!(ordered[0]["label"], "a");
        assert_eq!(ordered[1]["label"], "b");
        assert!(ordered[0].get("id").is_some());
    }

    #[test]
    fn test_projection_without_id_keeps_write_order() {
        let selection = Selection::default().select("label");
        let (keyed, strip_id) = keyed_selection(&ITEM, &selection);
        assert!(strip_id);
        assert_eq!(keyed.select.as_ref().map(|s| s.fields.clone()), Some(vec!["label".to_string(), "id".to_string()]));

        let (_, strip_id) = keyed_selection(&ITEM, &Selection::default().select("id").select("label"));
        assert!(!strip_id);
        let (keyed, strip_id) = keyed_selection(&ITEM, &Selection::default().omit("id"));
        assert!(strip_id);
        assert!(keyed.omit.is_empty());

        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let rows = ids
            .iter()
            .enumerate()
            .rev()
            .map(|(n, id)| json!({ "label": format!("n{}", n), "id": id.to_string() }))
            .collect();
        let ordered = in_write_order(&ITEM, &ids, rows, true);
        assert_eq!(
            ordered,
            vec![json!({ "label": "n0" }), json!({ "label": "n1" }), json!({ "label": "n2" }), json!({ "label": "n3" })]
        );
    }
}
