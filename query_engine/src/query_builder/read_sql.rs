//! Read statements
//!
//! Every read returns a single `jsonb` column shaped like the requested
//! result, so relations load in the same round trip as their parent.

use crate::errors::ClientError;
use crate::query_builder::aggregation::{AggregateArgs, AggregateFunction, AggregateSelection};
use crate::query_builder::args::{CountArgs, FindArgs};
use crate::query_builder::grouping::{GroupByArgs, HavingFilter};
use crate::query_builder::ordering::{OrderBy, OrderTarget};
use crate::query_builder::selection::{RelationSelection, Selection};
use crate::query_builder::sql_generation::{column, combine, limit_offset, quote, where_clause, Operand, OrderKey, SqlWriter, Statement};
use crate::schema::{FieldDef, ModelDef, RelationDef, RelationKind};
use type_mapping::ScalarType;

/// jsonb_build_object takes at most 100 arguments
const MAX_PAIRS_PER_OBJECT: usize = 50;

/// One page of rows, before projection
struct Page {
    alias: String,
    from: String,
    where_: String,
    order: String,
    limit: String,
    reversed: bool,
}

/// Build a jsonb object from (key, expression) pairs
fn build_object(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return "'{}'::jsonb".to_string();
    }
    pairs
        .chunks(MAX_PAIRS_PER_OBJECT)
        .map(|chunk| {
            let args = chunk
                .iter()
                .map(|(key, expr)| format!("'{}', {}", key.replace('\'', "''"), expr))
                .collect::<Vec<_>>()
                .join(", ");
            format!("jsonb_build_object({})", args)
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

impl SqlWriter {
    fn validate_page(&self, args: &FindArgs) -> Result<(), ClientError> {
        if let Some(skip) = args.skip {
            if skip < 0 {
                return Err(self.invalid(format!("`skip` must not be negative, got {}.", skip)));
            }
        }
        Ok(())
    }

    /// Filter, cursor, distinct and pagination over `model`, optionally
    /// correlated to a parent row through `parent`
    fn page(&mut self, model: &'static ModelDef, args: &FindArgs, parent: Option<(&'static RelationDef, &str)>) -> Result<Page, ClientError> {
        self.validate_page(args)?;
        let a = self.alias();
        let keys = self.order_keys(model, &args.order_by)?;
        let reversed = args.take.is_some_and(|t| t < 0);
        let walk: Vec<OrderKey> = if reversed {
            keys.iter().map(OrderKey::reversed).collect()
        } else {
            keys.clone()
        };

        let mut conditions = Vec::new();
        if let Some((relation, parent_alias)) = parent {
            conditions.push(Self::join_condition(relation, parent_alias, &a));
        }
        if let Some(filter) = &args.filter {
            conditions.push(self.filter(model, &a, filter)?);
        }

        let table = quote(model.table);
        let from = if args.distinct.is_empty() {
            format!("{} AS {}", table, a)
        } else {
            let mut distinct = Vec::with_capacity(args.distinct.len());
            for name in &args.distinct {
                let field = self.field(model, name)?;
                distinct.push(column(&a, field.name));
            }
            let distinct = distinct.join(", ");
            let from = format!(
                "(SELECT DISTINCT ON ({}) {}.* FROM {} AS {}{} ORDER BY {}, {}) AS {}",
                distinct,
                a,
                table,
                a,
                where_clause(&conditions),
                distinct,
                Self::order_sql(&a, &keys),
                a
            );
            conditions.clear();
            from
        };

        if let Some(cursor) = &args.cursor {
            conditions.push(self.cursor_condition(model, &a, cursor, &walk)?);
        }

        Ok(Page {
            where_: where_clause(&conditions),
            order: Self::order_sql(&a, &walk),
            limit: limit_offset(args.take, args.skip),
            alias: a,
            from,
            reversed,
        })
    }

    /// Rows as (`row` jsonb, `__ord` position) pairs
    fn find_rows(&mut self, model: &'static ModelDef, args: &FindArgs, parent: Option<(&'static RelationDef, &str)>) -> Result<(String, bool), ClientError> {
        let page = self.page(model, args, parent)?;
        let row = self.row_json(model, &page.alias, &args.selection)?;
        let sql = format!(
            "SELECT {} AS \"row\", row_number() OVER (ORDER BY {}) AS \"__ord\" FROM {}{} ORDER BY {}{}",
            row, page.order, page.from, page.where_, page.order, page.limit
        );
        Ok((sql, page.reversed))
    }

    /// Projection of one row of `model` as jsonb
    pub(crate) fn row_json(&mut self, model: &'static ModelDef, alias: &str, selection: &Selection) -> Result<String, ClientError> {
        if selection.select.is_some() && selection.include.is_some() {
            return Err(self.invalid(
                "Please either use `include` or `select`, but not both at the same time.",
            ));
        }
        if selection.select.is_some() && !selection.omit.is_empty() {
            return Err(self.invalid(
                "Please either use `omit` or `select`, but not both at the same time.",
            ));
        }
        for name in &selection.omit {
            self.field(model, name)?;
        }

        let mut pairs: Vec<(String, String)> = Vec::new();
        let (relations, counts): (&[RelationSelection], &[String]) = match (&selection.select, &selection.include) {
            (Some(select), _) => {
                for name in &select.fields {
                    let field = self.field(model, name)?;
                    if !pairs.iter().any(|(k, _)| k == field.name) {
                        pairs.push((field.name.to_string(), column(alias, field.name)));
                    }
                }
                (select.relations.as_slice(), select.count.as_slice())
            }
            (None, include) => {
                for field in model.fields {
                    if !selection.omit.iter().any(|o| o == field.name) {
                        pairs.push((field.name.to_string(), column(alias, field.name)));
                    }
                }
                match include {
                    Some(include) => (include.relations.as_slice(), include.count.as_slice()),
                    None => (&[][..], &[][..]),
                }
            }
        };

        for selected in relations {
            let relation = self.relation(model, &selected.relation)?;
            let expr = self.relation_json(alias, relation, &selected.args)?;
            pairs.retain(|(k, _)| k != relation.name);
            pairs.push((relation.name.to_string(), expr));
        }

        if !counts.is_empty() {
            let mut count_pairs = Vec::with_capacity(counts.len());
            for name in counts {
                let relation = self.relation(model, name)?;
                if relation.kind != RelationKind::ToMany {
                    return Err(self.invalid(format!(
                        "`_count` is only available on to-many relations, `{}` is to-one.",
                        relation.name
                    )));
                }
                let b = self.alias();
                count_pairs.push((
                    relation.name.to_string(),
                    format!(
                        "(SELECT COUNT(*) FROM {} AS {} WHERE {})",
                        quote(relation.target().table),
                        b,
                        Self::join_condition(relation, alias, &b)
                    ),
                ));
            }
            pairs.push(("_count".to_string(), build_object(&count_pairs)));
        }

        Ok(build_object(&pairs))
    }

    /// Correlated subquery loading one relation of the row at `alias`
    fn relation_json(&mut self, alias: &str, relation: &'static RelationDef, args: &FindArgs) -> Result<String, ClientError> {
        let target = relation.target();
        match relation.kind {
            RelationKind::ToOne => {
                if args.has_query_options() {
                    return Err(self.invalid(format!(
                        "Nested `where`, `orderBy` and pagination are only available on to-many relations; `{}` is to-one.",
                        relation.name
                    )));
                }
                let b = self.alias();
                let row = self.row_json(target, &b, &args.selection)?;
                Ok(format!(
                    "(SELECT {} FROM {} AS {} WHERE {} LIMIT 1)",
                    row,
                    quote(target.table),
                    b,
                    Self::join_condition(relation, alias, &b)
                ))
            }
            RelationKind::ToMany => {
                let (inner, reversed) = self.find_rows(target, args, Some((relation, alias)))?;
                let s = self.alias();
                Ok(format!(
                    "(SELECT COALESCE(jsonb_agg({s}.\"row\" ORDER BY {s}.\"__ord\"{}), '[]'::jsonb) FROM ({}) AS {s})",
                    if reversed { " DESC" } else { "" },
                    inner,
                    s = s
                ))
            }
        }
    }

    /// Ordered rows of findMany / findFirst / findUnique
    pub(crate) fn find_many(mut self, model: &'static ModelDef, args: &FindArgs) -> Result<Statement, ClientError> {
        let (inner, reversed) = self.find_rows(model, args, None)?;
        let sql = format!(
            "SELECT s.\"row\" FROM ({}) AS s ORDER BY s.\"__ord\"{}",
            inner,
            if reversed { " DESC" } else { "" }
        );
        Ok(self.finish(sql))
    }

    pub(crate) fn count(mut self, model: &'static ModelDef, args: &CountArgs) -> Result<Statement, ClientError> {
        let page = self.page(model, &args.as_find_args(), None)?;
        let projection = if args.select.is_empty() {
            "to_jsonb(COUNT(*))".to_string()
        } else {
            let mut pairs = Vec::with_capacity(args.select.len());
            for name in &args.select {
                if name == "_all" {
                    pairs.push(("_all".to_string(), "COUNT(*)".to_string()));
                } else {
                    let field = self.field(model, name)?;
                    pairs.push((field.name.to_string(), format!("COUNT({})", column("s", field.name))));
                }
            }
            build_object(&pairs)
        };
        let sql = format!(
            "SELECT {} FROM (SELECT {}.* FROM {}{} ORDER BY {}{}) AS s",
            projection, page.alias, page.from, page.where_, page.order, page.limit
        );
        Ok(self.finish(sql))
    }

    fn check_aggregate(&self, model: &ModelDef, function: AggregateFunction, name: &str) -> Result<&'static FieldDef, ClientError> {
        let field = self.field(model, name)?;
        if function.requires_numeric() && !field.scalar.is_numeric() {
            return Err(self.invalid(format!(
                "`{}` is only available on numeric fields, `{}` is {}.",
                function.result_key(),
                field.name,
                field.scalar.name()
            )));
        }
        if matches!(function, AggregateFunction::Min | AggregateFunction::Max) && field.scalar.is_list() {
            return Err(self.invalid(format!(
                "`{}` is not available on list field `{}`.",
                function.result_key(),
                field.name
            )));
        }
        Ok(field)
    }

    /// `COUNT(s."f")`, `AVG(s."f")`, ... over the grouped rows aliased `s`
    fn aggregate_expr(&self, model: &ModelDef, function: AggregateFunction, name: &str) -> Result<(String, &'static FieldDef), ClientError> {
        let field = self.check_aggregate(model, function, name)?;
        Ok((format!("{}({})", function.to_sql(), column("s", field.name)), field))
    }

    fn aggregate_pairs(&self, model: &ModelDef, aggregates: &AggregateSelection) -> Result<Vec<(String, String)>, ClientError> {
        let mut pairs = Vec::new();
        for (function, fields) in aggregates.groups() {
            let mut group = Vec::new();
            if function == AggregateFunction::Count && aggregates.count_all {
                group.push(("_all".to_string(), "COUNT(*)".to_string()));
            }
            for name in fields {
                let (expr, field) = self.aggregate_expr(model, function, name)?;
                group.push((field.name.to_string(), expr));
            }
            if !group.is_empty() {
                pairs.push((function.result_key().to_string(), build_object(&group)));
            }
        }
        Ok(pairs)
    }

    pub(crate) fn aggregate(mut self, model: &'static ModelDef, args: &AggregateArgs) -> Result<Statement, ClientError> {
        let find = FindArgs {
            filter: args.filter.clone(),
            order_by: args.order_by.clone(),
            cursor: args.cursor.clone(),
            skip: args.skip,
            take: args.take,
            distinct: Vec::new(),
            selection: Selection::default(),
        };
        let page = self.page(model, &find, None)?;
        let pairs = self.aggregate_pairs(model, &args.aggregates)?;
        let sql = format!(
            "SELECT {} FROM (SELECT {}.* FROM {}{} ORDER BY {}{}) AS s",
            build_object(&pairs),
            page.alias,
            page.from,
            page.where_,
            page.order,
            page.limit
        );
        Ok(self.finish(sql))
    }

    fn having(&mut self, model: &'static ModelDef, by: &[&'static FieldDef], having: &HavingFilter) -> Result<String, ClientError> {
        match having {
            HavingFilter::Field { field, filter } => {
                let def = by.iter().find(|f| f.name == field.as_str()).ok_or_else(|| {
                    self.invalid(format!(
                        "Every field used in `having` filters must either be an aggregation filter or be included in the selection of the `by` argument; `{}` is not in `by`.",
                        field
                    ))
                })?;
                let operand = Operand {
                    label: def.name,
                    scalar: def.scalar,
                    nullable: def.nullable,
                    expr: column("s", def.name),
                };
                self.field_filter(&operand, filter)
            }
            HavingFilter::Aggregate { function, field, filter } => {
                let (expr, scalar, nullable, label) = if field == "_all" {
                    if *function != AggregateFunction::Count {
                        return Err(self.invalid(format!(
                            "`_all` is only available with `_count`, not `{}`.",
                            function.result_key()
                        )));
                    }
                    ("COUNT(*)".to_string(), ScalarType::Int, false, "_count._all".to_string())
                } else {
                    let (expr, def) = self.aggregate_expr(model, *function, field)?;
                    let scalar = match function {
                        AggregateFunction::Count => ScalarType::Int,
                        AggregateFunction::Avg => ScalarType::Float,
                        _ => def.scalar,
                    };
                    let nullable = *function != AggregateFunction::Count;
                    (expr, scalar, nullable, format!("{}.{}", function.result_key(), def.name))
                };
                let operand = Operand {
                    label: &label,
                    scalar,
                    nullable,
                    expr,
                };
                self.field_filter(&operand, filter)
            }
            HavingFilter::And(filters) => {
                let parts = filters
                    .iter()
                    .map(|f| self.having(model, by, f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(parts, " AND ", "TRUE"))
            }
            HavingFilter::Or(filters) => {
                let parts = filters
                    .iter()
                    .map(|f| self.having(model, by, f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(parts, " OR ", "FALSE"))
            }
            HavingFilter::Not(filters) => {
                let parts = filters
                    .iter()
                    .map(|f| self.having(model, by, f).map(|sql| format!("NOT {}", sql)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(combine(parts, " AND ", "TRUE"))
            }
        }
    }

    fn group_order(&self, model: &ModelDef, by: &[&'static FieldDef], order: &OrderBy) -> Result<String, ClientError> {
        let expr = match &order.target {
            OrderTarget::Field(name) => {
                let field = by.iter().find(|f| f.name == name.as_str()).ok_or_else(|| {
                    self.invalid(format!(
                        "Every field used for `orderBy` must be included in the `by` argument; `{}` is not.",
                        name
                    ))
                })?;
                column("s", field.name)
            }
            OrderTarget::Aggregate(AggregateFunction::Count, name) if name == "_all" => {
                "COUNT(*)".to_string()
            }
            OrderTarget::Aggregate(function, name) => self.aggregate_expr(model, *function, name)?.0,
        };
        Ok(format!(
            "{} {} {}",
            expr,
            order.order.to_sql(),
            order.effective_nulls().to_sql()
        ))
    }

    pub(crate) fn group_by(mut self, model: &'static ModelDef, args: &GroupByArgs) -> Result<Statement, ClientError> {
        if args.by.is_empty() {
            return Err(self.invalid("`by` must contain at least one field."));
        }
        let mut by: Vec<&'static FieldDef> = Vec::with_capacity(args.by.len());
        for name in &args.by {
            let field = self.field(model, name)?;
            if !by.iter().any(|f| f.name == field.name) {
                by.push(field);
            }
        }
        if (args.skip.is_some() || args.take.is_some()) && args.order_by.is_empty() {
            return Err(self.invalid("`skip` and `take` in groupBy require an `orderBy`."));
        }
        if let Some(take) = args.take {
            if take < 0 {
                return Err(self.invalid("`take` must not be negative in groupBy."));
            }
        }
        if let Some(skip) = args.skip {
            if skip < 0 {
                return Err(self.invalid(format!("`skip` must not be negative, got {}.", skip)));
            }
        }

        let a = self.alias();
        let filter = match &args.filter {
            Some(filter) => vec![self.filter(model, &a, filter)?],
            None => Vec::new(),
        };
        let having = match &args.having {
            Some(having) => format!(" HAVING {}", self.having(model, &by, having)?),
            None => String::new(),
        };
        let order = args
            .order_by
            .iter()
            .map(|o| self.group_order(model, &by, o))
            .collect::<Result<Vec<_>, _>>()?;

        let mut pairs: Vec<(String, String)> = by
            .iter()
            .map(|f| (f.name.to_string(), column("s", f.name)))
            .collect();
        pairs.extend(self.aggregate_pairs(model, &args.aggregates)?);

        let group = by
            .iter()
            .map(|f| column("s", f.name))
            .collect::<Vec<_>>()
            .join(", ");
        let order = if order.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", order.join(", "))
        };
        let sql = format!(
            "SELECT {} FROM (SELECT {}.* FROM {} AS {}{}) AS s GROUP BY {}{}{}{}",
            build_object(&pairs),
            a,
            quote(model.table),
            a,
            where_clause(&filter),
            group,
            having,
            order,
            limit_offset(args.take, args.skip)
        );
        Ok(self.finish(sql))
    }
}
