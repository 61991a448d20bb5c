//! Operation dispatch
//!
//! A `Dispatcher` ties an engine, a session (pool or open transaction) and a
//! middleware stack together. Delegates, transaction scopes and clients are
//! all thin wrappers around one.

use crate::delegate::Delegate;
use crate::engine::{expired_error, Engine, RawSql, Session, TransactionOptions};
use crate::errors::ClientError;
use crate::middleware::{Middleware, Next};
use crate::operation::{BatchResults, OperationParams, PendingOperation};
use crate::schema::Model;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, RwLock};

pub type MiddlewareStack = Arc<RwLock<Vec<Arc<dyn Middleware>>>>;

#[derive(Clone)]
pub struct Dispatcher {
    engine: Engine,
    session: Session,
    middleware: MiddlewareStack,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engine", &self.engine)
            .field("in_transaction", &self.in_transaction())
            .field("middleware", &self.chain().len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            session: Session::Pool,
            middleware: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.session, Session::Transaction(_))
    }

    pub fn delegate<M: Model>(&self) -> Delegate<M> {
        Delegate::new(self.clone())
    }

    fn chain(&self) -> Vec<Arc<dyn Middleware>> {
        match self.middleware.read() {
            Ok(stack) => stack.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Append to the shared stack, affecting every clone of this dispatcher
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        match self.middleware.write() {
            Ok(mut stack) => stack.push(middleware),
            Err(poisoned) => poisoned.into_inner().push(middleware),
        }
    }

    /// A dispatcher with its own copy of the stack plus `middleware`
    pub fn extended(&self, middleware: Arc<dyn Middleware>) -> Self {
        let mut chain = self.chain();
        chain.push(middleware);
        Self {
            engine: self.engine.clone(),
            session: self.session.clone(),
            middleware: Arc::new(RwLock::new(chain)),
        }
    }

    /// Run one operation through the middleware registered at this moment
    pub async fn dispatch(&self, params: OperationParams) -> Result<Value, ClientError> {
        let chain: Arc<[Arc<dyn Middleware>]> = self.chain().into();
        Next::new(chain, self.engine.clone(), self.session.clone())
            .run(params)
            .await
    }

    fn scoped(&self, session: Session) -> Self {
        Self {
            engine: self.engine.clone(),
            session,
            middleware: Arc::clone(&self.middleware),
        }
    }

    fn nested_error() -> ClientError {
        ClientError::transaction("Nested transactions are not supported.")
    }

    /// Run `f` inside one transaction: committed when it returns `Ok`,
    /// rolled back on error or when `options.timeout` elapses
    pub async fn transaction<F, Fut, T>(&self, options: TransactionOptions, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(Dispatcher) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if self.in_transaction() {
            return Err(Self::nested_error());
        }
        let handle = self.engine.begin(&options).await?;
        let scope = self.scoped(Session::Transaction(handle.clone()));

        match tokio::time::timeout(options.timeout, f(scope)).await {
            Ok(Ok(value)) => {
                handle.commit().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                handle.rollback(&self.engine).await;
                Err(err)
            }
            Err(_) => {
                handle.rollback(&self.engine).await;
                Err(expired_error(options.timeout))
            }
        }
    }

    /// Run independently built operations in order inside one transaction
    pub async fn transaction_batch(&self, operations: Vec<PendingOperation>, options: TransactionOptions) -> Result<BatchResults, ClientError> {
        if self.in_transaction() {
            return Err(Self::nested_error());
        }
        let mut batch = Vec::with_capacity(operations.len());
        for operation in operations {
            if let Some(err) = operation.deferred {
                return Err(err);
            }
            let mut params = operation.params;
            params.run_in_transaction = true;
            batch.push(params);
        }

        self.transaction(options, |scope| async move {
            let mut results = Vec::with_capacity(batch.len());
            for params in batch {
                results.push(scope.dispatch(params).await?);
            }
            Ok(BatchResults::new(results))
        })
        .await
    }

    /// Raw statements bypass middleware
    pub async fn execute_raw(&self, raw: RawSql) -> Result<u64, ClientError> {
        self.engine.execute_raw(&self.session, raw).await
    }

    pub async fn query_raw<T: DeserializeOwned>(&self, raw: RawSql) -> Result<Vec<T>, ClientError> {
        self.engine
            .query_raw(&self.session, raw)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(ClientError::from))
            .collect()
    }
}
