//! SQL generation primitives
//!
//! `SqlWriter` accumulates positional parameters while fragments are
//! rendered. Fragments may be placed in any textual order; every `$n`
//! refers to the n-th value bound on the writer.

use crate::errors::ClientError;
use crate::query_builder::args::UniqueWhere;
use crate::query_builder::filter::{FieldFilter, QueryCondition, QueryFilter, QueryMode, QueryOperator, RelationFilter};
use crate::query_builder::ordering::{NullsOrder, OrderBy, OrderTarget, SortOrder};
use crate::schema::{FieldDef, ModelDef, RelationDef, RelationKind};
use serde_json::Value;
use type_mapping::{coerce_json, PostgresValue, ScalarType};

/// A rendered statement with its bind values
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<PostgresValue>,
}

/// Quote an identifier
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn column(alias: &str, field: &str) -> String {
    format!("{}.{}", alias, quote(field))
}

/// Escape LIKE wildcards so the operand matches literally
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A value compared by a condition: a column or an aggregate expression
pub(crate) struct Operand<'a> {
    pub label: &'a str,
    pub scalar: ScalarType,
    pub nullable: bool,
    pub expr: String,
}

/// One resolved ordering key
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrderKey {
    pub field: &'static FieldDef,
    pub order: SortOrder,
    pub nulls: NullsOrder,
}

impl OrderKey {
    pub fn reversed(&self) -> Self {
        Self {
            field: self.field,
            order: self.order.reversed(),
            nulls: self.nulls.reversed(),
        }
    }
}

pub(crate) struct SqlWriter {
    model: &'static str,
    action: &'static str,
    params: Vec<PostgresValue>,
    aliases: usize,
}

impl SqlWriter {
    /// `model` and `action` name the invocation in validation errors
    pub fn new(model: &'static str, action: &'static str) -> Self {
        Self {
            model,
            action,
            params: Vec::new(),
            aliases: 0,
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> ClientError {
        ClientError::validation(self.model, self.action, message)
    }

    pub fn bind(&mut self, value: PostgresValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Fresh table alias, unique within the statement
    pub fn alias(&mut self) -> String {
        self.aliases += 1;
        format!("t{}", self.aliases)
    }

    pub fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }

    pub fn field(&self, model: &ModelDef, name: &str) -> Result<&'static FieldDef, ClientError> {
        model.field(name).ok_or_else(|| {
            if model.relation(name).is_some() {
                self.invalid(format!(
                    "`{}` is a relation of `{}`, not a scalar field.",
                    name, model.name
                ))
            } else {
                self.invalid(format!("Unknown field `{}` for model `{}`.", name, model.name))
            }
        })
    }

    pub fn relation(&self, model: &ModelDef, name: &str) -> Result<&'static RelationDef, ClientError> {
        model.relation(name).ok_or_else(|| {
            self.invalid(format!("Unknown relation `{}` for model `{}`.", name, model.name))
        })
    }

    /// Coerce a caller value for `field`; `null` is allowed on nullable fields only
    pub fn coerce(&self, model: &ModelDef, field: &FieldDef, value: &Value) -> Result<PostgresValue, ClientError> {
        if value.is_null() && !field.nullable {
            return Err(self.invalid(format!(
                "Argument `{}` must not be null.",
                field.name
            )));
        }
        self.coerce_scalar(&format!("{}.{}", model.name, field.name), field.scalar, value)
    }

    pub fn coerce_scalar(&self, label: &str, scalar: ScalarType, value: &Value) -> Result<PostgresValue, ClientError> {
        coerce_json(value, scalar)
            .map_err(|e| self.invalid(format!("Invalid value for `{}`: {}", label, e)))
    }

    /// Unique lookups must name a primary-key or unique field
    pub fn unique_field(&self, model: &ModelDef, unique: &UniqueWhere) -> Result<&'static FieldDef, ClientError> {
        let mut candidates = Vec::with_capacity(unique.equals.len());
        for (name, value) in &unique.equals {
            candidates.push((self.field(model, name)?, value));
        }
        let chosen = candidates
            .iter()
            .find(|(f, _)| f.is_id)
            .or_else(|| candidates.iter().find(|(f, _)| f.is_unique));
        let Some(&(field, value)) = chosen else {
            let given = candidates.iter().map(|(f, _)| f.name).collect::<Vec<_>>().join(", ");
            return Err(self.invalid(format!(
                "`{}` is not a unique field of `{}`; a unique filter needs one of: {}.",
                given,
                model.name,
                model
                    .fields
                    .iter()
                    .filter(|f| f.is_id || f.is_unique)
                    .map(|f| f.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        };
        if value.is_null() {
            return Err(self.invalid(format!(
                "Argument `{}` of a unique filter must not be null.",
                field.name
            )));
        }
        Ok(field)
    }

    /// Unique filter on `alias`
    pub fn unique_filter(&mut self, model: &'static ModelDef, alias: &str, unique: &UniqueWhere) -> Result<String, ClientError> {
        self.unique_field(model, unique)?;
        self.filter(model, alias, &unique.to_filter())
    }

    pub fn filter(&mut self, model: &'static ModelDef, alias: &str, filter: &QueryFilter) -> Result<String, ClientError> {
        match filter {
            QueryFilter::Field { field, filter } => {
                let def = self.field(model, field)?;
                let operand = Operand {
                    label: def.name,
                    scalar: def.scalar,
                    nullable: def.nullable,
                    expr: column(alias, def.name),
                };
                self.field_filter(&operand, filter)
            }
            QueryFilter::Relation { relation, filter } => {
                let def = self.relation(model, relation)?;
                self.relation_filter(alias, def, filter)
            }
            QueryFilter::And(filters) => {
                let parts = filters
                    .iter()
                    .map(|f| self.filter(model, alias, f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(parts, " AND ", "TRUE"))
            }
            QueryFilter::Or(filters) => {
                let parts = filters
                    .iter()
                    .map(|f| self.filter(model, alias, f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(parts, " OR ", "FALSE"))
            }
            QueryFilter::Not(filters) => {
                let parts = filters
                    .iter()
                    .map(|f| self.filter(model, alias, f).map(|sql| format!("NOT {}", sql)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(parts, " AND ", "TRUE"))
            }
        }
    }

    /// All conditions on one operand, combined with AND
    pub fn field_filter(&mut self, operand: &Operand<'_>, filter: &FieldFilter) -> Result<String, ClientError> {
        let mut parts = Vec::with_capacity(filter.conditions.len() + 1);
        for condition in &filter.conditions {
            parts.push(self.condition(operand, filter.mode, condition)?);
        }
        if let Some(not) = filter.not.as_ref().filter(|n| !n.is_empty()) {
            let mut inner = (**not).clone();
            if inner.mode == QueryMode::Default {
                inner.mode = filter.mode;
            }
            parts.push(format!("NOT {}", self.field_filter(operand, &inner)?));
        }
        Ok(combine(parts, " AND ", "TRUE"))
    }

    fn condition(&mut self, operand: &Operand<'_>, mode: QueryMode, condition: &QueryCondition) -> Result<String, ClientError> {
        let scalar = operand.scalar;
        let expr = &operand.expr;
        let insensitive = mode == QueryMode::Insensitive && scalar == ScalarType::String;
        if mode == QueryMode::Insensitive && scalar != ScalarType::String {
            return Err(self.invalid(format!(
                "`mode: insensitive` applies to String fields only, `{}` is {}.",
                operand.label,
                scalar.name()
            )));
        }
        let op = condition.operator;
        let list_only = matches!(
            op,
            QueryOperator::Has | QueryOperator::HasEvery | QueryOperator::HasSome | QueryOperator::IsEmpty
        );
        if list_only != scalar.is_list() && op != QueryOperator::Equals {
            return Err(self.invalid(format!(
                "Filter condition `{}` is not available on `{}` ({}).",
                op.key(),
                operand.label,
                scalar.name()
            )));
        }

        let value = &condition.value;
        match op {
            QueryOperator::Equals => {
                if value.is_null() {
                    if !operand.nullable {
                        return Err(self.invalid(format!(
                            "Argument `{}` is not nullable; `equals: null` never matches.",
                            operand.label
                        )));
                    }
                    return Ok(format!("{} IS NULL", expr));
                }
                let param = self.operand_value(operand, value)?;
                Ok(if insensitive {
                    format!("LOWER({}) = LOWER({})", expr, param)
                } else {
                    format!("{} = {}", expr, param)
                })
            }
            QueryOperator::In | QueryOperator::NotIn => {
                let items = value.as_array().ok_or_else(|| {
                    self.invalid(format!(
                        "Filter condition `{}` on `{}` expects a list.",
                        op.key(),
                        operand.label
                    ))
                })?;
                let negated = op == QueryOperator::NotIn;
                if items.is_empty() {
                    return Ok(if negated { "TRUE" } else { "FALSE" }.to_string());
                }
                let mut placeholders = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_null() {
                        return Err(self.invalid(format!(
                            "Filter condition `{}` on `{}` cannot contain null.",
                            op.key(),
                            operand.label
                        )));
                    }
                    let param = self.operand_value(operand, item)?;
                    placeholders.push(if insensitive {
                        format!("LOWER({})", param)
                    } else {
                        param
                    });
                }
                let target = if insensitive {
                    format!("LOWER({})", expr)
                } else {
                    expr.clone()
                };
                Ok(format!(
                    "{} {}IN ({})",
                    target,
                    if negated { "NOT " } else { "" },
                    placeholders.join(", ")
                ))
            }
            QueryOperator::Lt | QueryOperator::Lte | QueryOperator::Gt | QueryOperator::Gte => {
                if !scalar.is_orderable() || value.is_null() {
                    return Err(self.invalid(format!(
                        "Filter condition `{}` on `{}` needs a comparable, non-null value.",
                        op.key(),
                        operand.label
                    )));
                }
                let sign = match op {
                    QueryOperator::Lt => "<",
                    QueryOperator::Lte => "<=",
                    QueryOperator::Gt => ">",
                    _ => ">=",
                };
                let param = self.operand_value(operand, value)?;
                Ok(if insensitive {
                    format!("LOWER({}) {} LOWER({})", expr, sign, param)
                } else {
                    format!("{} {} {}", expr, sign, param)
                })
            }
            QueryOperator::Contains | QueryOperator::StartsWith | QueryOperator::EndsWith => {
                if scalar != ScalarType::String {
                    return Err(self.invalid(format!(
                        "Filter condition `{}` applies to String fields only, `{}` is {}.",
                        op.key(),
                        operand.label,
                        scalar.name()
                    )));
                }
                let text = value.as_str().ok_or_else(|| {
                    self.invalid(format!(
                        "Filter condition `{}` on `{}` expects a string.",
                        op.key(),
                        operand.label
                    ))
                })?;
                let escaped = escape_like(text);
                let pattern = match op {
                    QueryOperator::Contains => format!("%{}%", escaped),
                    QueryOperator::StartsWith => format!("{}%", escaped),
                    _ => format!("%{}", escaped),
                };
                let param = self.bind(PostgresValue::Text(pattern));
                Ok(format!(
                    "{} {} {}",
                    expr,
                    if insensitive { "ILIKE" } else { "LIKE" },
                    param
                ))
            }
            QueryOperator::Has => {
                let item = self.coerce_scalar(operand.label, ScalarType::String, value)?;
                if item.is_null() {
                    return Err(self.invalid(format!(
                        "Filter condition `has` on `{}` needs a value.",
                        operand.label
                    )));
                }
                let param = self.bind(item);
                Ok(format!("{} = ANY({})", param, expr))
            }
            QueryOperator::HasEvery | QueryOperator::HasSome => {
                let items = self.coerce_scalar(operand.label, ScalarType::StringList, value)?;
                if items.is_null() {
                    return Err(self.invalid(format!(
                        "Filter condition `{}` on `{}` expects a list.",
                        op.key(),
                        operand.label
                    )));
                }
                let param = self.bind(items);
                Ok(format!(
                    "{} {} {}",
                    expr,
                    if op == QueryOperator::HasEvery { "@>" } else { "&&" },
                    param
                ))
            }
            QueryOperator::IsEmpty => {
                let empty = value.as_bool().ok_or_else(|| {
                    self.invalid(format!(
                        "Filter condition `isEmpty` on `{}` expects a boolean.",
                        operand.label
                    ))
                })?;
                Ok(format!(
                    "cardinality({}) {}",
                    expr,
                    if empty { "= 0" } else { "> 0" }
                ))
            }
        }
    }

    fn operand_value(&mut self, operand: &Operand<'_>, value: &Value) -> Result<String, ClientError> {
        let coerced = self.coerce_scalar(operand.label, operand.scalar, value)?;
        Ok(self.bind(coerced))
    }

    /// `b."remote" = a."local"` for a relation walked from `alias`
    pub fn join_condition(relation: &RelationDef, alias: &str, target_alias: &str) -> String {
        format!(
            "{} = {}",
            column(target_alias, relation.remote_field),
            column(alias, relation.local_field)
        )
    }

    fn relation_filter(&mut self, alias: &str, relation: &'static RelationDef, filter: &RelationFilter) -> Result<String, ClientError> {
        let wants_many = matches!(
            filter,
            RelationFilter::Some(_) | RelationFilter::Every(_) | RelationFilter::None(_)
        );
        if wants_many != (relation.kind == RelationKind::ToMany) {
            let (kind, expected) = if wants_many {
                ("to-one", "`is` / `isNot`")
            } else {
                ("to-many", "`some` / `every` / `none`")
            };
            return Err(self.invalid(format!(
                "`{}` is a {} relation; use {} to filter it.",
                relation.name, kind, expected
            )));
        }

        let target = relation.target();
        let b = self.alias();
        let join = Self::join_condition(relation, alias, &b);
        let exists = |cond: Option<String>| {
            let cond = cond.map(|c| format!(" AND {}", c)).unwrap_or_default();
            format!(
                "EXISTS (SELECT 1 FROM {} AS {} WHERE {}{})",
                quote(target.table),
                b,
                join,
                cond
            )
        };
        Ok(match filter {
            RelationFilter::Some(f) => exists(Some(self.filter(target, &b, f)?)),
            RelationFilter::None(f) => format!("NOT {}", exists(Some(self.filter(target, &b, f)?))),
            RelationFilter::Every(f) => {
                let cond = self.filter(target, &b, f)?;
                format!("NOT {}", exists(Some(format!("NOT COALESCE({}, FALSE)", cond))))
            }
            RelationFilter::Is(Some(f)) => exists(Some(self.filter(target, &b, f)?)),
            RelationFilter::Is(None) => format!("NOT {}", exists(None)),
            RelationFilter::IsNot(Some(f)) => format!("NOT {}", exists(Some(self.filter(target, &b, f)?))),
            RelationFilter::IsNot(None) => exists(None),
        })
    }

    /// Requested ordering plus a primary-key tie-break
    pub fn order_keys(&self, model: &ModelDef, order_by: &[OrderBy]) -> Result<Vec<OrderKey>, ClientError> {
        let mut keys: Vec<OrderKey> = Vec::with_capacity(order_by.len() + 1);
        for order in order_by {
            let name = match &order.target {
                OrderTarget::Field(name) => name,
                OrderTarget::Aggregate(function, _) => {
                    return Err(self.invalid(format!(
                        "Ordering by `{}` is only available in groupBy.",
                        function.result_key()
                    )))
                }
            };
            let field = self.field(model, name)?;
            if field.scalar.is_list() {
                return Err(self.invalid(format!("Cannot order by list field `{}`.", field.name)));
            }
            if keys.iter().any(|k| k.field.name == field.name) {
                continue;
            }
            keys.push(OrderKey {
                field,
                order: order.order,
                nulls: order.effective_nulls(),
            });
        }
        let id = model.id_field();
        if !keys.iter().any(|k| k.field.name == id.name) {
            keys.push(OrderKey {
                field: id,
                order: SortOrder::Asc,
                nulls: NullsOrder::Last,
            });
        }
        Ok(keys)
    }

    pub fn order_sql(alias: &str, keys: &[OrderKey]) -> String {
        keys.iter()
            .map(|k| {
                format!(
                    "{} {} {}",
                    column(alias, k.field.name),
                    k.order.to_sql(),
                    k.nulls.to_sql()
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Rows at or after the cursor row under `keys`; nothing when the cursor row is missing
    pub fn cursor_condition(&mut self, model: &'static ModelDef, alias: &str, cursor: &UniqueWhere, keys: &[OrderKey]) -> Result<String, ClientError> {
        let c = self.alias();
        let locate = self.unique_filter(model, &c, cursor)?;
        let table = quote(model.table);
        let cursor_value = |field: &str| {
            format!(
                "(SELECT {} FROM {} AS {} WHERE {})",
                column(&c, field),
                table,
                c,
                locate
            )
        };

        let mut condition: Option<String> = None;
        for (index, key) in keys.iter().enumerate().rev() {
            let own = column(alias, key.field.name);
            let cv = cursor_value(key.field.name);
            let sign = match key.order {
                SortOrder::Asc => ">",
                SortOrder::Desc => "<",
            };
            condition = Some(match condition {
                None => {
                    // The last key is the primary key and never null
                    debug_assert_eq!(index, keys.len() - 1);
                    format!("{} {}= {}", own, sign, cv)
                }
                Some(next) => {
                    let mut after = format!("{} {} {}", own, sign, cv);
                    if key.field.nullable {
                        let null_after = match key.nulls {
                            NullsOrder::Last => format!("({} IS NULL AND {} IS NOT NULL)", own, cv),
                            NullsOrder::First => format!("({} IS NOT NULL AND {} IS NULL)", own, cv),
                        };
                        after = format!("{} OR {}", after, null_after);
                    }
                    format!(
                        "({} OR ({} IS NOT DISTINCT FROM {} AND {}))",
                        after, own, cv, next
                    )
                }
            });
        }

        Ok(format!(
            "EXISTS (SELECT 1 FROM {} AS {} WHERE {}) AND {}",
            table,
            c,
            locate,
            condition.unwrap_or_else(|| "TRUE".to_string())
        ))
    }
}

/// Join fragments, each parenthesised; `empty` stands in for no fragments
pub(crate) fn combine(parts: Vec<String>, separator: &str, empty: &str) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => format!("({})", parts[0]),
        _ => format!(
            "({})",
            parts
                .iter()
                .map(|p| format!("({})", p))
                .collect::<Vec<_>>()
                .join(separator)
        ),
    }
}

pub(crate) fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

pub(crate) fn limit_offset(take: Option<i64>, skip: Option<i64>) -> String {
    let mut sql = String::new();
    if let Some(take) = take {
        sql.push_str(&format!(" LIMIT {}", take.unsigned_abs()));
    }
    if let Some(skip) = skip.filter(|s| *s > 0) {
        sql.push_str(&format!(" OFFSET {}", skip));
    }
    sql
}
