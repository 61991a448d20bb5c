//! Middleware chain
//!
//! Each middleware receives the operation parameters and a [`Next`] handle.
//! It may rewrite the parameters before calling `next.run(params)`, return
//! a value of its own without calling it, or post-process the result.

use crate::engine::{Engine, Session};
use crate::errors::ClientError;
use crate::operation::OperationParams;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, params: OperationParams, next: Next) -> Result<Value, ClientError>;
}

/// The rest of the chain, ending at the engine
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    engine: Engine,
    session: Session,
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.chain.len() - self.index))
            .finish()
    }
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Middleware>]>, engine: Engine, session: Session) -> Self {
        Self {
            chain,
            index: 0,
            engine,
            session,
        }
    }

    pub fn run(self, params: OperationParams) -> BoxFuture<'static, Result<Value, ClientError>> {
        Box::pin(async move {
            match self.chain.get(self.index).cloned() {
                Some(middleware) => {
                    let next = Next {
                        chain: Arc::clone(&self.chain),
                        index: self.index + 1,
                        engine: self.engine,
                        session: self.session,
                    };
                    middleware.handle(params, next).await
                }
                None => self.engine.execute(&self.session, params).await,
            }
        })
    }
}

/// Middleware from an async closure
pub struct FnMiddleware<F>(F);

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(OperationParams, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ClientError>> + Send + 'static,
{
    async fn handle(&self, params: OperationParams, next: Next) -> Result<Value, ClientError> {
        (self.0)(params, next).await
    }
}

pub fn middleware_fn<F, Fut>(f: F) -> FnMiddleware<F>
where
    F: Fn(OperationParams, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ClientError>> + Send + 'static,
{
    FnMiddleware(f)
}
