//! Write statements
//!
//! Single-record writes compile to a list of steps run in order inside one
//! transaction. Identifiers are generated up front, so a nested create can
//! reference its parent (or child) without reading anything back.

use crate::errors::ClientError;
use crate::query_builder::args::{CreateManyArgs, DeleteManyArgs, UniqueWhere, UpdateManyArgs};
use crate::query_builder::sql_generation::{quote, where_clause, SqlWriter, Statement};
use crate::query_builder::update::{CreateData, RelationWrite, UpdateData, UpdateOperation};
use crate::schema::{AutoValue, FieldDef, ModelDef, RelationDef, RelationKind};
use chrono::{DateTime, Utc};
use type_mapping::{PostgresValue, ScalarType};
use uuid::Uuid;

/// PostgreSQL accepts at most this many bind parameters per statement
const MAX_BIND_PARAMS: usize = 65_535;

/// What a step must produce for the write to proceed
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    Nothing,
    /// At least one row; otherwise a not-found error with this message
    Row(String),
    /// At least one affected row; otherwise a not-found error with this message
    Affected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteStep {
    pub statement: Statement,
    pub expect: Expect,
}

impl WriteStep {
    fn execute(statement: Statement) -> Self {
        Self {
            statement,
            expect: Expect::Nothing,
        }
    }
}

/// Invocation being planned, and the instant used for timestamps
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteContext {
    pub model: &'static str,
    pub action: &'static str,
    pub now: DateTime<Utc>,
}

impl WriteContext {
    pub fn new(model: &'static ModelDef, action: &'static str) -> Self {
        Self {
            model: model.name,
            action,
            now: Utc::now(),
        }
    }

    fn writer(&self) -> SqlWriter {
        SqlWriter::new(self.model, self.action)
    }

    fn invalid(&self, message: impl Into<String>) -> ClientError {
        ClientError::validation(self.model, self.action, message)
    }
}

/// `"updatedAt" = ...` keeping the timestamp strictly increasing
fn touch(w: &mut SqlWriter, model: &ModelDef, now: DateTime<Utc>) -> Option<String> {
    model.updated_at_field().map(|field| {
        let col = quote(field.name);
        let param = w.bind(PostgresValue::Timestamp(now));
        format!(
            "{col} = GREATEST({}, {col} + INTERVAL '1 microsecond')",
            param,
            col = col
        )
    })
}

fn foreign_key(ctx: &WriteContext, model: &ModelDef, relation: &RelationDef, name: &str) -> Result<&'static FieldDef, ClientError> {
    model.field(name).ok_or_else(|| {
        ctx.invalid(format!(
            "Relation `{}` references unknown field `{}` on `{}`.",
            relation.name, name, model.name
        ))
    })
}

fn check_to_one_write(ctx: &WriteContext, relation: &RelationDef, write: &RelationWrite, allow_disconnect: bool) -> Result<(), ClientError> {
    if !write.disconnect.is_empty() {
        return Err(ctx.invalid(format!(
            "`{}` is a to-one relation; disconnect it with `disconnect: true`.",
            relation.name
        )));
    }
    if write.disconnect_current && !allow_disconnect {
        return Err(ctx.invalid(format!(
            "`disconnect` is not available when creating `{}`.",
            relation.name
        )));
    }
    let writes = write.create.len() + write.connect.len() + usize::from(write.disconnect_current);
    if writes > 1 {
        return Err(ctx.invalid(format!(
            "The to-one relation `{}` accepts exactly one of `create`, `connect` or `disconnect`.",
            relation.name
        )));
    }
    Ok(())
}

/// Statement failing with not-found when the connect target is missing
fn require_target(ctx: &WriteContext, owner: &ModelDef, relation: &RelationDef, unique: &UniqueWhere) -> Result<WriteStep, ClientError> {
    let target = relation.target();
    let mut w = ctx.writer();
    let t = w.alias();
    let locate = w.unique_filter(target, &t, unique)?;
    let sql = format!(
        "SELECT 1 FROM {} AS {} WHERE {} LIMIT 1",
        quote(target.table),
        t,
        locate
    );
    Ok(WriteStep {
        statement: w.finish(sql),
        expect: Expect::Row(format!(
            "No '{}' record was found for a nested connect on relation '{}.{}'.",
            target.name, owner.name, relation.name
        )),
    })
}

/// `(SELECT t."id" FROM target t WHERE unique)` rendered on `w`
fn target_key(w: &mut SqlWriter, relation: &RelationDef, unique: &UniqueWhere) -> Result<String, ClientError> {
    let target = relation.target();
    let t = w.alias();
    let locate = w.unique_filter(target, &t, unique)?;
    Ok(format!(
        "(SELECT {}.{} FROM {} AS {} WHERE {})",
        t,
        quote(relation.remote_field),
        quote(target.table),
        t,
        locate
    ))
}

/// Point an existing child row at `parent_id`
fn connect_child(ctx: &WriteContext, owner: &ModelDef, relation: &RelationDef, parent_id: Uuid, unique: &UniqueWhere) -> Result<WriteStep, ClientError> {
    let target = relation.target();
    let fk = foreign_key(ctx, target, relation, relation.remote_field)?;
    let mut w = ctx.writer();
    let t = w.alias();
    let mut sets = vec![format!("{} = {}", quote(fk.name), w.bind(PostgresValue::Uuid(parent_id)))];
    sets.extend(touch(&mut w, target, ctx.now));
    let locate = w.unique_filter(target, &t, unique)?;
    let sql = format!(
        "UPDATE {} AS {} SET {} WHERE {}",
        quote(target.table),
        t,
        sets.join(", "),
        locate
    );
    Ok(WriteStep {
        statement: w.finish(sql),
        expect: Expect::Affected(format!(
            "No '{}' record was found for a nested connect on relation '{}.{}'.",
            target.name, owner.name, relation.name
        )),
    })
}

fn disconnect_child(ctx: &WriteContext, relation: &RelationDef, parent_id: Uuid, unique: &UniqueWhere) -> Result<WriteStep, ClientError> {
    let target = relation.target();
    let fk = foreign_key(ctx, target, relation, relation.remote_field)?;
    if !fk.nullable {
        return Err(ctx.invalid(format!(
            "Cannot disconnect from `{}`: `{}.{}` is required.",
            relation.name, target.name, fk.name
        )));
    }
    let mut w = ctx.writer();
    let t = w.alias();
    let mut sets = vec![format!("{} = NULL", quote(fk.name))];
    sets.extend(touch(&mut w, target, ctx.now));
    let locate = w.unique_filter(target, &t, unique)?;
    let parent = w.bind(PostgresValue::Uuid(parent_id));
    let sql = format!(
        "UPDATE {} AS {} SET {} WHERE {} AND {}.{} = {}",
        quote(target.table),
        t,
        sets.join(", "),
        locate,
        t,
        quote(fk.name),
        parent
    );
    Ok(WriteStep::execute(w.finish(sql)))
}

fn push_column(ctx: &WriteContext, columns: &mut Vec<(&'static str, String)>, field: &'static FieldDef, expr: String) -> Result<(), ClientError> {
    if columns.iter().any(|(name, _)| *name == field.name) {
        return Err(ctx.invalid(format!(
            "`{}` is set more than once, directly and through a nested write.",
            field.name
        )));
    }
    columns.push((field.name, expr));
    Ok(())
}

/// Plan the insert of one row and its nested writes into `steps`;
/// `inverse` fixes a foreign key to the parent of a nested to-many create
fn plan_insert(ctx: &WriteContext, model: &'static ModelDef, data: &CreateData, inverse: Option<(&'static FieldDef, Uuid)>, steps: &mut Vec<WriteStep>) -> Result<Uuid, ClientError> {
    let mut w = ctx.writer();
    let mut columns: Vec<(&'static str, String)> = Vec::new();
    let id_field = model.id_field();

    let id = match data.get(id_field.name) {
        Some(value) => match w.coerce(model, id_field, value)? {
            PostgresValue::Uuid(id) => id,
            _ => return Err(ctx.invalid(format!("Invalid value for `{}.{}`.", model.name, id_field.name))),
        },
        None => Uuid::new_v4(),
    };
    let param = w.bind(PostgresValue::Uuid(id));
    columns.push((id_field.name, param));

    for (name, value) in &data.fields {
        if model.relation(name).is_some() {
            return Err(ctx.invalid(format!(
                "`{}` is a relation; write it with `create` or `connect`.",
                name
            )));
        }
        let field = w.field(model, name)?;
        if field.is_id {
            continue;
        }
        let bound = w.coerce(model, field, value)?;
        let param = w.bind(bound);
        push_column(ctx, &mut columns, field, param)?;
    }

    if let Some((fk, parent_id)) = inverse {
        let param = w.bind(PostgresValue::Uuid(parent_id));
        push_column(ctx, &mut columns, fk, param)?;
    }

    let mut after = Vec::new();
    for (name, write) in &data.relations {
        let relation = w.relation(model, name)?;
        match relation.kind {
            RelationKind::ToOne => {
                check_to_one_write(ctx, relation, write, false)?;
                let fk = foreign_key(ctx, model, relation, relation.local_field)?;
                if let Some(child) = write.create.first() {
                    let child_id = plan_insert(ctx, relation.target(), child, None, steps)?;
                    let param = w.bind(PostgresValue::Uuid(child_id));
                    push_column(ctx, &mut columns, fk, param)?;
                }
                if let Some(unique) = write.connect.first() {
                    steps.push(require_target(ctx, model, relation, unique)?);
                    let key = target_key(&mut w, relation, unique)?;
                    push_column(ctx, &mut columns, fk, key)?;
                }
            }
            RelationKind::ToMany => {
                if write.disconnect_current || !write.disconnect.is_empty() {
                    return Err(ctx.invalid(format!(
                        "`disconnect` is not available when creating `{}`.",
                        relation.name
                    )));
                }
                let target = relation.target();
                let fk = foreign_key(ctx, target, relation, relation.remote_field)?;
                for child in &write.create {
                    plan_insert(ctx, target, child, Some((fk, id)), &mut after)?;
                }
                for unique in &write.connect {
                    after.push(connect_child(ctx, model, relation, id, unique)?);
                }
            }
        }
    }

    for field in model.fields {
        if columns.iter().any(|(name, _)| *name == field.name) {
            continue;
        }
        match field.auto {
            AutoValue::CreatedAt | AutoValue::UpdatedAt => {
                let param = w.bind(PostgresValue::Timestamp(ctx.now));
                columns.push((field.name, param));
            }
            _ if field.is_required_on_create() => {
                return Err(ctx.invalid(format!(
                    "Argument `{}` is missing for `{}`.",
                    field.name, model.name
                )));
            }
            _ => {}
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(model.table),
        columns
            .iter()
            .map(|(name, _)| quote(name))
            .collect::<Vec<_>>()
            .join(", "),
        columns
            .iter()
            .map(|(_, expr)| expr.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    steps.push(WriteStep::execute(w.finish(sql)));
    steps.extend(after);
    Ok(id)
}

/// Steps creating one row with its nested writes; returns the new id
pub(crate) fn plan_create(ctx: &WriteContext, model: &'static ModelDef, data: &CreateData) -> Result<(Uuid, Vec<WriteStep>), ClientError> {
    let mut steps = Vec::new();
    let id = plan_insert(ctx, model, data, None, &mut steps)?;
    Ok((id, steps))
}

/// `"col" = expr` assignments for scalar updates, refreshing `updatedAt`
fn set_clause(ctx: &WriteContext, w: &mut SqlWriter, model: &'static ModelDef, fields: &[(String, UpdateOperation)]) -> Result<Vec<String>, ClientError> {
    let mut sets = Vec::with_capacity(fields.len() + 1);
    let mut touched_updated_at = false;
    for (name, operation) in fields {
        if model.relation(name).is_some() {
            return Err(ctx.invalid(format!(
                "`{}` is a relation; write it with `create`, `connect` or `disconnect`.",
                name
            )));
        }
        let field = w.field(model, name)?;
        if field.is_id {
            return Err(ctx.invalid(format!(
                "The primary key `{}` of `{}` cannot be updated.",
                field.name, model.name
            )));
        }
        if field.auto == AutoValue::UpdatedAt {
            touched_updated_at = true;
        }
        let col = quote(field.name);
        let value = operation.value();
        let expr = match operation {
            UpdateOperation::Set(_) => {
                let bound = w.coerce(model, field, value)?;
                w.bind(bound)
            }
            UpdateOperation::Push(_) => {
                if !field.scalar.is_list() {
                    return Err(ctx.invalid(format!(
                        "`push` applies to list fields only, `{}` is {}.",
                        field.name,
                        field.scalar.name()
                    )));
                }
                let items = match value {
                    serde_json::Value::Array(_) => value.clone(),
                    single => serde_json::Value::Array(vec![single.clone()]),
                };
                let bound = w.coerce_scalar(field.name, ScalarType::StringList, &items)?;
                format!("{} || {}", col, w.bind(bound))
            }
            _ => {
                if !field.scalar.is_numeric() {
                    return Err(ctx.invalid(format!(
                        "`{}` applies to numeric fields only, `{}` is {}.",
                        operation.name(),
                        field.name,
                        field.scalar.name()
                    )));
                }
                if value.is_null() {
                    return Err(ctx.invalid(format!(
                        "`{}` on `{}` needs a number.",
                        operation.name(),
                        field.name
                    )));
                }
                let bound = w.coerce_scalar(field.name, field.scalar, value)?;
                let sign = operation.arithmetic_operator().unwrap_or("+");
                format!("{} {} {}", col, sign, w.bind(bound))
            }
        };
        sets.push(format!("{} = {}", col, expr));
    }
    if !touched_updated_at {
        sets.extend(touch(w, model, ctx.now));
    }
    Ok(sets)
}

/// Steps updating the row `id`; nested creates of to-one relations run first
pub(crate) fn plan_update(ctx: &WriteContext, model: &'static ModelDef, id: Uuid, data: &UpdateData) -> Result<Vec<WriteStep>, ClientError> {
    let mut steps = Vec::new();
    let mut after = Vec::new();
    let mut w = ctx.writer();
    let mut sets = set_clause(ctx, &mut w, model, &data.fields)?;

    for (name, write) in &data.relations {
        let relation = w.relation(model, name)?;
        match relation.kind {
            RelationKind::ToOne => {
                check_to_one_write(ctx, relation, write, true)?;
                let fk = foreign_key(ctx, model, relation, relation.local_field)?;
                let col = quote(fk.name);
                if data.fields.iter().any(|(field, _)| field == fk.name) {
                    return Err(ctx.invalid(format!(
                        "`{}` is set more than once, directly and through a nested write.",
                        fk.name
                    )));
                }
                if let Some(child) = write.create.first() {
                    let child_id = plan_insert(ctx, relation.target(), child, None, &mut steps)?;
                    sets.push(format!("{} = {}", col, w.bind(PostgresValue::Uuid(child_id))));
                }
                if let Some(unique) = write.connect.first() {
                    steps.push(require_target(ctx, model, relation, unique)?);
                    let key = target_key(&mut w, relation, unique)?;
                    sets.push(format!("{} = {}", col, key));
                }
                if write.disconnect_current {
                    if !relation.optional {
                        return Err(ctx.invalid(format!(
                            "Cannot disconnect `{}`: `{}.{}` is required.",
                            relation.name, model.name, fk.name
                        )));
                    }
                    sets.push(format!("{} = NULL", col));
                }
            }
            RelationKind::ToMany => {
                if write.disconnect_current {
                    return Err(ctx.invalid(format!(
                        "`{}` is a to-many relation; disconnect rows by a unique filter.",
                        relation.name
                    )));
                }
                let target = relation.target();
                let fk = foreign_key(ctx, target, relation, relation.remote_field)?;
                for child in &write.create {
                    plan_insert(ctx, target, child, Some((fk, id)), &mut after)?;
                }
                for unique in &write.connect {
                    after.push(connect_child(ctx, model, relation, id, unique)?);
                }
                for unique in &write.disconnect {
                    after.push(disconnect_child(ctx, relation, id, unique)?);
                }
            }
        }
    }

    let id_field = model.id_field();
    if sets.is_empty() {
        sets.push(format!("{col} = {col}", col = quote(id_field.name)));
    }
    let param = w.bind(PostgresValue::Uuid(id));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote(model.table),
        sets.join(", "),
        quote(id_field.name),
        param
    );
    steps.push(WriteStep {
        statement: w.finish(sql),
        expect: Expect::Affected("Record to update not found.".to_string()),
    });
    steps.extend(after);
    Ok(steps)
}

/// `"id" IN (SELECT ...)` selecting the rows a bulk write touches
fn bulk_target(w: &mut SqlWriter, model: &'static ModelDef, filter: Option<&crate::query_builder::filter::QueryFilter>, limit: Option<i64>) -> Result<String, ClientError> {
    if let Some(limit) = limit {
        if limit < 0 {
            return Err(w.invalid(format!("`limit` must not be negative, got {}.", limit)));
        }
    }
    let a = w.alias();
    let id = model.id_field().name;
    let conditions = match filter {
        Some(filter) => vec![w.filter(model, &a, filter)?],
        None => Vec::new(),
    };
    Ok(format!(
        "{} IN (SELECT {}.{} FROM {} AS {}{}{})",
        quote(id),
        a,
        quote(id),
        quote(model.table),
        a,
        where_clause(&conditions),
        limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default()
    ))
}

/// updateMany; with `returning` the statement yields the touched ids
pub(crate) fn update_many(ctx: &WriteContext, model: &'static ModelDef, args: &UpdateManyArgs, returning: bool) -> Result<Statement, ClientError> {
    if !args.data.relations.is_empty() {
        return Err(ctx.invalid("Nested writes are not available in bulk updates."));
    }
    let mut w = ctx.writer();
    let sets = set_clause(ctx, &mut w, model, &args.data.fields)?;
    if sets.is_empty() {
        return Err(ctx.invalid("`data` must contain at least one field to update."));
    }
    let target = bulk_target(&mut w, model, args.filter.as_ref(), args.limit)?;
    let sql = format!(
        "UPDATE {} SET {} WHERE {}{}",
        quote(model.table),
        sets.join(", "),
        target,
        if returning {
            format!(" RETURNING {}", quote(model.id_field().name))
        } else {
            String::new()
        }
    );
    Ok(w.finish(sql))
}

pub(crate) fn delete_many(ctx: &WriteContext, model: &'static ModelDef, args: &DeleteManyArgs) -> Result<Statement, ClientError> {
    let mut w = ctx.writer();
    let target = bulk_target(&mut w, model, args.filter.as_ref(), args.limit)?;
    let sql = format!("DELETE FROM {} WHERE {}", quote(model.table), target);
    Ok(w.finish(sql))
}

/// Lock the row a unique filter designates, yielding its id
pub(crate) fn lookup_for_update(ctx: &WriteContext, model: &'static ModelDef, unique: &UniqueWhere) -> Result<Statement, ClientError> {
    let mut w = ctx.writer();
    let a = w.alias();
    let locate = w.unique_filter(model, &a, unique)?;
    let sql = format!(
        "SELECT {}.{} FROM {} AS {} WHERE {} LIMIT 1 FOR UPDATE",
        a,
        quote(model.id_field().name),
        quote(model.table),
        a,
        locate
    );
    Ok(w.finish(sql))
}

pub(crate) fn delete_by_id(ctx: &WriteContext, model: &'static ModelDef, id: Uuid) -> Statement {
    let mut w = ctx.writer();
    let param = w.bind(PostgresValue::Uuid(id));
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quote(model.table),
        quote(model.id_field().name),
        param
    );
    w.finish(sql)
}

/// Multi-row inserts, split to respect the bind parameter limit.
/// Columns a row leaves out take their store default.
pub(crate) fn create_many(ctx: &WriteContext, model: &'static ModelDef, args: &CreateManyArgs, returning: bool) -> Result<Vec<Statement>, ClientError> {
    let validator = ctx.writer();
    let mut rows: Vec<Vec<(&'static str, PostgresValue)>> = Vec::with_capacity(args.data.len());
    for data in &args.data {
        if !data.relations.is_empty() {
            return Err(ctx.invalid("Nested writes are not available in createMany."));
        }
        let mut row: Vec<(&'static str, PostgresValue)> = Vec::with_capacity(model.fields.len());
        for (name, value) in &data.fields {
            let field = validator.field(model, name)?;
            row.push((field.name, validator.coerce(model, field, value)?));
        }
        for field in model.fields {
            if row.iter().any(|(name, _)| *name == field.name) {
                continue;
            }
            match field.auto {
                AutoValue::Uuid => row.push((field.name, PostgresValue::Uuid(Uuid::new_v4()))),
                AutoValue::CreatedAt | AutoValue::UpdatedAt => {
                    row.push((field.name, PostgresValue::Timestamp(ctx.now)))
                }
                AutoValue::None if field.is_required_on_create() => {
                    return Err(ctx.invalid(format!(
                        "Argument `{}` is missing for `{}`.",
                        field.name, model.name
                    )));
                }
                AutoValue::None => {}
            }
        }
        rows.push(row);
    }

    let columns: Vec<&'static str> = model
        .fields
        .iter()
        .map(|f| f.name)
        .filter(|name| rows.iter().any(|row| row.iter().any(|(c, _)| c == name)))
        .collect();
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let rows_per_statement = (MAX_BIND_PARAMS / columns.len()).max(1);
    let mut statements = Vec::new();
    for chunk in rows.chunks(rows_per_statement) {
        let mut w = ctx.writer();
        let mut values = Vec::with_capacity(chunk.len());
        for row in chunk {
            let mut exprs = Vec::with_capacity(columns.len());
            for name in &columns {
                match row.iter().find(|(c, _)| c == name) {
                    Some((_, value)) => exprs.push(w.bind(value.clone())),
                    None => exprs.push("DEFAULT".to_string()),
                }
            }
            values.push(format!("({})", exprs.join(", ")));
        }
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote(model.table),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            values.join(", ")
        );
        if args.skip_duplicates {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }
        if returning {
            sql.push_str(&format!(" RETURNING {}", quote(model.id_field().name)));
        }
        statements.push(w.finish(sql));
    }
    Ok(statements)
}
