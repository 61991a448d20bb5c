//! Operation descriptors
//!
//! Delegate methods do not touch the database. They return an
//! [`Operation`], a plain description of the call that runs when awaited
//! or that can be handed to a batch transaction.

use crate::dispatch::Dispatcher;
use crate::errors::ClientError;
use crate::query_builder::{
    AggregateArgs, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs, FindArgs, FindUniqueArgs,
    GroupByArgs, Selection, UpdateArgs, UpdateManyArgs, UpsertArgs,
};
use crate::schema::ModelDef;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::IntoFuture;
use std::marker::PhantomData;

/// Operation names, as seen by middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FindUnique,
    FindUniqueOrThrow,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Create,
    CreateMany,
    CreateManyAndReturn,
    Update,
    UpdateMany,
    UpdateManyAndReturn,
    Upsert,
    Delete,
    DeleteMany,
    Count,
    Aggregate,
    GroupBy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FindUnique => "findUnique",
            Action::FindUniqueOrThrow => "findUniqueOrThrow",
            Action::FindFirst => "findFirst",
            Action::FindFirstOrThrow => "findFirstOrThrow",
            Action::FindMany => "findMany",
            Action::Create => "create",
            Action::CreateMany => "createMany",
            Action::CreateManyAndReturn => "createManyAndReturn",
            Action::Update => "update",
            Action::UpdateMany => "updateMany",
            Action::UpdateManyAndReturn => "updateManyAndReturn",
            Action::Upsert => "upsert",
            Action::Delete => "delete",
            Action::DeleteMany => "deleteMany",
            Action::Count => "count",
            Action::Aggregate => "aggregate",
            Action::GroupBy => "groupBy",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Action::Create
                | Action::CreateMany
                | Action::CreateManyAndReturn
                | Action::Update
                | Action::UpdateMany
                | Action::UpdateManyAndReturn
                | Action::Upsert
                | Action::Delete
                | Action::DeleteMany
        )
    }

    /// Resolves to at most one row of the model
    pub fn returns_single_row(&self) -> bool {
        matches!(
            self,
            Action::FindUnique
                | Action::FindUniqueOrThrow
                | Action::FindFirst
                | Action::FindFirstOrThrow
                | Action::Create
                | Action::Update
                | Action::Upsert
                | Action::Delete
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of an operation; the variant must suit the action
#[derive(Debug, Clone)]
pub enum QueryArgs {
    FindUnique(FindUniqueArgs),
    Find(FindArgs),
    Create(CreateArgs),
    CreateMany(CreateManyArgs),
    Update(UpdateArgs),
    UpdateMany(UpdateManyArgs),
    Upsert(UpsertArgs),
    Delete(DeleteArgs),
    DeleteMany(DeleteManyArgs),
    Count(CountArgs),
    Aggregate(AggregateArgs),
    GroupBy(GroupByArgs),
}

impl QueryArgs {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryArgs::FindUnique(_) => "findUnique",
            QueryArgs::Find(_) => "find",
            QueryArgs::Create(_) => "create",
            QueryArgs::CreateMany(_) => "createMany",
            QueryArgs::Update(_) => "update",
            QueryArgs::UpdateMany(_) => "updateMany",
            QueryArgs::Upsert(_) => "upsert",
            QueryArgs::Delete(_) => "delete",
            QueryArgs::DeleteMany(_) => "deleteMany",
            QueryArgs::Count(_) => "count",
            QueryArgs::Aggregate(_) => "aggregate",
            QueryArgs::GroupBy(_) => "groupBy",
        }
    }

    /// Result shaping, for operations returning rows
    pub fn selection_mut(&mut self) -> Option<&mut Selection> {
        match self {
            QueryArgs::FindUnique(args) => Some(&mut args.selection),
            QueryArgs::Find(args) => Some(&mut args.selection),
            QueryArgs::Create(args) => Some(&mut args.selection),
            QueryArgs::CreateMany(args) => Some(&mut args.selection),
            QueryArgs::Update(args) => Some(&mut args.selection),
            QueryArgs::UpdateMany(args) => Some(&mut args.selection),
            QueryArgs::Upsert(args) => Some(&mut args.selection),
            QueryArgs::Delete(args) => Some(&mut args.selection),
            QueryArgs::DeleteMany(_)
            | QueryArgs::Count(_)
            | QueryArgs::Aggregate(_)
            | QueryArgs::GroupBy(_) => None,
        }
    }
}

/// Everything middleware sees about one call
#[derive(Debug, Clone)]
pub struct OperationParams {
    pub model: &'static ModelDef,
    pub action: Action,
    pub args: QueryArgs,
    /// Relations walked by fluent access, applied to the result
    pub data_path: Vec<String>,
    pub run_in_transaction: bool,
}

impl OperationParams {
    pub fn new(model: &'static ModelDef, action: Action, args: QueryArgs) -> Self {
        Self {
            model,
            action,
            args,
            data_path: Vec::new(),
            run_in_transaction: false,
        }
    }
}

/// Result of createMany, updateMany and deleteMany
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub count: i64,
}

/// A call ready to run; awaiting it dispatches through middleware
#[must_use = "operations do nothing unless awaited or passed to a batch transaction"]
pub struct Operation<T> {
    dispatcher: Dispatcher,
    params: OperationParams,
    deferred: Option<ClientError>,
    _result: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Operation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("params", &self.params)
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl<T> Operation<T> {
    pub(crate) fn new(dispatcher: Dispatcher, mut params: OperationParams) -> Self {
        params.run_in_transaction = dispatcher.in_transaction();
        Self {
            dispatcher,
            params,
            deferred: None,
            _result: PhantomData,
        }
    }

    pub fn params(&self) -> &OperationParams {
        &self.params
    }

    /// Decode the result into another shape, e.g. a projection
    pub fn with_shape<R>(self) -> Operation<R> {
        Operation {
            dispatcher: self.dispatcher,
            params: self.params,
            deferred: self.deferred,
            _result: PhantomData,
        }
    }

    /// Change how returned rows are shaped
    pub fn shape(mut self, f: impl FnOnce(Selection) -> Selection) -> Self {
        match self.params.args.selection_mut() {
            Some(selection) => *selection = f(std::mem::take(selection)),
            None => self.defer_unshaped("shape"),
        }
        self
    }

    /// Fluent access to one relation of the returned row; resolves to `None`
    /// when the row itself is missing. Only for actions returning one row.
    pub fn relation<R>(mut self, relation: &str, args: FindArgs) -> Operation<Option<R>> {
        if !self.params.action.returns_single_row() {
            self.defer_unshaped("relation");
            return self.with_shape();
        }
        match self.params.args.selection_mut() {
            Some(selection) => {
                *selection = Selection::only_relation(relation, args);
                self.params.data_path.push(relation.to_string());
            }
            None => self.defer_unshaped("relation"),
        }
        self.with_shape()
    }

    fn defer_unshaped(&mut self, method: &str) {
        if self.deferred.is_none() {
            self.deferred = Some(ClientError::validation(
                self.params.model.name,
                self.params.action.as_str(),
                format!("`{}` is not available on `{}`.", method, self.params.action),
            ));
        }
    }

    /// Detach from the result type, for `transaction_batch`
    pub fn into_pending(self) -> PendingOperation {
        PendingOperation {
            params: self.params,
            deferred: self.deferred,
        }
    }
}

impl<T> IntoFuture for Operation<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = Result<T, ClientError>;
    type IntoFuture = BoxFuture<'static, Result<T, ClientError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            if let Some(err) = self.deferred {
                return Err(err);
            }
            let value = self.dispatcher.dispatch(self.params).await?;
            Ok(serde_json::from_value(value)?)
        })
    }
}

/// An operation queued for a batch transaction
#[derive(Debug)]
pub struct PendingOperation {
    pub(crate) params: OperationParams,
    pub(crate) deferred: Option<ClientError>,
}

impl PendingOperation {
    pub fn params(&self) -> &OperationParams {
        &self.params
    }
}

impl<T> From<Operation<T>> for PendingOperation {
    fn from(operation: Operation<T>) -> Self {
        operation.into_pending()
    }
}

/// Results of a batch transaction, in submission order
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResults(Vec<Value>);

impl BatchResults {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the result at `index` into the shape of its operation
    pub fn decode<T: DeserializeOwned>(&self, index: usize) -> Result<T, ClientError> {
        let value = self.0.get(index).ok_or_else(|| {
            ClientError::Serialization(format!(
                "Batch has {} results, index {} is out of range",
                self.0.len(),
                index
            ))
        })?;
        Ok(T::deserialize(value)?)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}
