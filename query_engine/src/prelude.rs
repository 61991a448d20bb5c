//! Convenience re-exports for building and running operations

// Operation arguments
pub use crate::query_builder::{
    AggregateArgs, AggregateFunction, AggregateResult, AggregateSelection, AggregateValues, BoolFilter, CountArgs,
    CountResult, CreateArgs, CreateData, CreateManyArgs, DateTimeFilter, DeleteArgs, DeleteManyArgs, FindArgs,
    FindUniqueArgs, FloatFilter, GroupByArgs, GroupByRow, HavingFilter, IntFilter, ListFilter, NullsOrder, OrderBy,
    QueryFilter, QueryMode, RelationFilter, RelationWrite, ScalarFilter, Selectable, Selection, SortOrder,
    StringFilter, Unique, UniqueWhere, UpdateArgs, UpdateData, UpdateManyArgs, UpdateOperation, UpsertArgs,
    UuidFilter,
};

// Running operations
pub use crate::delegate::Delegate;
pub use crate::engine::{IsolationLevel, RawSql, TransactionOptions};
pub use crate::errors::ClientError;
pub use crate::middleware::{middleware_fn, Middleware, Next};
pub use crate::operation::{
    Action, BatchPayload, BatchResults, Operation, OperationParams, PendingOperation, QueryArgs,
};
pub use crate::schema::Model;

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;
