//! Query builder
//!
//! Argument types for every operation and their compilation to PostgreSQL.

pub mod aggregation;
pub mod args;
pub mod filter;
pub mod grouping;
pub mod ordering;
pub mod read_sql;
pub mod selection;
pub mod sql_generation;
pub mod update;
pub mod write_sql;


pub use aggregation::{AggregateArgs, AggregateFunction, AggregateResult, AggregateSelection, AggregateValues, CountResult};
pub use args::{
    CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs, FindArgs, FindUniqueArgs, Unique, UniqueWhere,
    UpdateArgs, UpdateManyArgs, UpsertArgs,
};
pub use filter::{
    BoolFilter, DateTimeFilter, FieldFilter, FloatFilter, IntFilter, ListFilter, QueryFilter, QueryMode, QueryOperator,
    RelationFilter, ScalarFilter, StringFilter, UuidFilter,
};
pub use grouping::{GroupByArgs, GroupByRow, HavingFilter};
pub use ordering::{NullsOrder, OrderBy, SortOrder};
pub use selection::{Selectable, Selection};
pub use sql_generation::Statement;
pub use update::{CreateData, RelationWrite, UpdateData, UpdateOperation};
