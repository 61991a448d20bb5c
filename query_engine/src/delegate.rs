//! Per-model delegates
//!
//! `Delegate<M>` exposes the operation set for one model. Every method only
//! builds an [`Operation`]; nothing runs until it is awaited.

use crate::dispatch::Dispatcher;
use crate::operation::{Action, BatchPayload, Operation, OperationParams, QueryArgs};
use crate::query_builder::{
    AggregateArgs, AggregateResult, CountArgs, CountResult, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs,
    FindArgs, FindUniqueArgs, GroupByArgs, GroupByRow, UniqueWhere, UpdateArgs, UpdateManyArgs, UpsertArgs,
};
use crate::schema::Model;
use std::marker::PhantomData;

pub struct Delegate<M> {
    dispatcher: Dispatcher,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Delegate<M> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for Delegate<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegate")
            .field("model", &M::def().name)
            .field("in_transaction", &self.dispatcher.in_transaction())
            .finish()
    }
}

impl<M: Model> Delegate<M> {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            _model: PhantomData,
        }
    }

    fn operation<T>(&self, action: Action, args: QueryArgs) -> Operation<T> {
        Operation::new(
            self.dispatcher.clone(),
            OperationParams::new(M::def(), action, args),
        )
    }

    /// The row matching a unique filter, if any
    pub fn find_unique(&self, where_: impl Into<UniqueWhere>) -> Operation<Option<M>> {
        self.find_unique_with(FindUniqueArgs::new(where_))
    }

    pub fn find_unique_with(&self, args: FindUniqueArgs) -> Operation<Option<M>> {
        self.operation(Action::FindUnique, QueryArgs::FindUnique(args))
    }

    /// Like `find_unique`, failing with P2025 when nothing matches
    pub fn find_unique_or_throw(&self, where_: impl Into<UniqueWhere>) -> Operation<M> {
        self.find_unique_or_throw_with(FindUniqueArgs::new(where_))
    }

    pub fn find_unique_or_throw_with(&self, args: FindUniqueArgs) -> Operation<M> {
        self.operation(Action::FindUniqueOrThrow, QueryArgs::FindUnique(args))
    }

    pub fn find_first(&self, args: FindArgs) -> Operation<Option<M>> {
        self.operation(Action::FindFirst, QueryArgs::Find(args))
    }

    pub fn find_first_or_throw(&self, args: FindArgs) -> Operation<M> {
        self.operation(Action::FindFirstOrThrow, QueryArgs::Find(args))
    }

    pub fn find_many(&self, args: FindArgs) -> Operation<Vec<M>> {
        self.operation(Action::FindMany, QueryArgs::Find(args))
    }

    pub fn create(&self, args: CreateArgs) -> Operation<M> {
        self.operation(Action::Create, QueryArgs::Create(args))
    }

    pub fn create_many(&self, args: CreateManyArgs) -> Operation<BatchPayload> {
        self.operation(Action::CreateMany, QueryArgs::CreateMany(args))
    }

    pub fn create_many_and_return(&self, args: CreateManyArgs) -> Operation<Vec<M>> {
        self.operation(Action::CreateManyAndReturn, QueryArgs::CreateMany(args))
    }

    pub fn update(&self, args: UpdateArgs) -> Operation<M> {
        self.operation(Action::Update, QueryArgs::Update(args))
    }

    pub fn update_many(&self, args: UpdateManyArgs) -> Operation<BatchPayload> {
        self.operation(Action::UpdateMany, QueryArgs::UpdateMany(args))
    }

    pub fn update_many_and_return(&self, args: UpdateManyArgs) -> Operation<Vec<M>> {
        self.operation(Action::UpdateManyAndReturn, QueryArgs::UpdateMany(args))
    }

    pub fn upsert(&self, args: UpsertArgs) -> Operation<M> {
        self.operation(Action::Upsert, QueryArgs::Upsert(args))
    }

    /// Delete one row, resolving to its state before deletion
    pub fn delete(&self, args: DeleteArgs) -> Operation<M> {
        self.operation(Action::Delete, QueryArgs::Delete(args))
    }

    pub fn delete_many(&self, args: DeleteManyArgs) -> Operation<BatchPayload> {
        self.operation(Action::DeleteMany, QueryArgs::DeleteMany(args))
    }

    /// Number of matching rows
    pub fn count(&self, args: CountArgs) -> Operation<i64> {
        self.operation(Action::Count, QueryArgs::Count(args))
    }

    /// `_all` plus non-null counts of the selected fields
    pub fn count_fields(&self, mut args: CountArgs) -> Operation<CountResult> {
        if !args.select.iter().any(|field| field == "_all") {
            args.select.insert(0, "_all".to_string());
        }
        self.operation(Action::Count, QueryArgs::Count(args))
    }

    pub fn aggregate(&self, args: AggregateArgs) -> Operation<AggregateResult> {
        self.operation(Action::Aggregate, QueryArgs::Aggregate(args))
    }

    pub fn group_by(&self, args: GroupByArgs) -> Operation<Vec<GroupByRow>> {
        self.operation(Action::GroupBy, QueryArgs::GroupBy(args))
    }
}
