//! Client façade
//!
//! `ShopClient` owns the engine (pool, configuration, event bus) and hands
//! out one delegate per model. `TransactionClient` is the scoped handle
//! given to interactive transactions; it has no transaction, lifecycle or
//! middleware methods, so transactions cannot nest through it.

use query_engine::{
    codes, BatchResults, ClientError, Delegate, Dispatcher, Engine, Middleware, PendingOperation, RawSql,
    TransactionOptions,
};
use query_events::{ClientEvent, EventBus, EventType, SubscriptionId};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::models::{self, Address, Admin, Category, DeliveryInfo, Order, PaymentInfo, Product, Review, User};
use config::{AppConfig, ConfigError};

fn config_error(err: ConfigError) -> ClientError {
    let code = match err {
        ConfigError::InvalidUrl(_) => codes::INVALID_URL,
        _ => codes::INVALID_CONFIG,
    };
    ClientError::initialization(code, err.to_string())
}

macro_rules! model_delegates {
    ($($method:ident => $model:ty),* $(,)?) => {
        $(
            #[doc = concat!("Operations on `", stringify!($model), "` rows")]
            pub fn $method(&self) -> Delegate<$model> {
                self.dispatcher.delegate::<$model>()
            }
        )*
    };
}

/// Typed access to the shop database
#[derive(Debug, Clone)]
pub struct ShopClient {
    dispatcher: Dispatcher,
}

impl ShopClient {
    /// Build a client; no connection is opened until the first operation
    /// or an explicit [`connect`](Self::connect)
    pub fn new(config: AppConfig) -> Result<Self, ClientError> {
        config.validate().map_err(config_error)?;
        query_engine::validate_schema(&models::all_models())
            .map_err(|e| ClientError::initialization(codes::SCHEMA_INVALID, e.to_string()))?;

        info!(
            target: "shopdb::client",
            "Client ready for database '{}'",
            config.database.database
        );
        let engine = Engine::with_events(config, Arc::new(EventBus::new()));
        Ok(Self {
            dispatcher: Dispatcher::new(engine),
        })
    }

    /// Build a client from `SHOPDB_CONFIG`, `./shopdb.toml` or `DATABASE_URL`
    pub fn from_env() -> Result<Self, ClientError> {
        let config = AppConfig::load().map_err(config_error)?;
        Self::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        self.dispatcher.engine().config()
    }

    model_delegates! {
        user => User,
        address => Address,
        admin => Admin,
        category => Category,
        product => Product,
        order => Order,
        delivery_info => DeliveryInfo,
        payment_info => PaymentInfo,
        review => Review,
    }

    /// Subscribe to query or log events
    pub fn on<F>(&self, event_type: EventType, callback: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.dispatcher.engine().events().subscribe(event_type, callback)
    }

    /// Remove a subscription; returns whether it existed
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.dispatcher.engine().events().unsubscribe(id)
    }

    /// Open the connection pool eagerly
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.dispatcher.engine().connect().await.map(|_| ())
    }

    /// Close the pool; later operations reconnect on demand
    pub async fn disconnect(&self) {
        self.dispatcher.engine().disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.dispatcher.engine().is_connected().await
    }

    /// Append middleware to this client and every clone sharing its stack
    #[deprecated(note = "use `extends`, which leaves the original client untouched")]
    pub fn use_middleware(&self, middleware: impl Middleware + 'static) {
        self.dispatcher.use_middleware(Arc::new(middleware));
    }

    /// A new client whose operations also pass through `extension`
    pub fn extends(&self, extension: impl Middleware + 'static) -> ShopClient {
        ShopClient {
            dispatcher: self.dispatcher.extended(Arc::new(extension)),
        }
    }

    /// Transaction options with the configured `max_wait` and `timeout`
    pub fn transaction_options(&self) -> TransactionOptions {
        TransactionOptions::from_config(&self.config().transaction)
    }

    /// Run `f` in one interactive transaction
    ///
    /// Committed when `f` returns `Ok`; rolled back when it fails or runs
    /// past `options.timeout`, which surfaces as P2028.
    pub async fn transaction<F, Fut, T>(&self, options: TransactionOptions, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(TransactionClient) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        self.dispatcher
            .transaction(options, |dispatcher| f(TransactionClient { dispatcher }))
            .await
    }

    /// Run prepared operations in order, all or nothing
    pub async fn transaction_batch(&self, operations: Vec<PendingOperation>) -> Result<BatchResults, ClientError> {
        self.transaction_batch_with(operations, self.transaction_options())
            .await
    }

    pub async fn transaction_batch_with(
        &self,
        operations: Vec<PendingOperation>,
        options: TransactionOptions,
    ) -> Result<BatchResults, ClientError> {
        self.dispatcher.transaction_batch(operations, options).await
    }

    /// Parameterised statement; resolves to the number of affected rows
    pub async fn execute_raw(&self, raw: RawSql) -> Result<u64, ClientError> {
        self.dispatcher.execute_raw(raw).await
    }

    /// Statement text used as given; the caller is responsible for escaping
    pub async fn execute_raw_unsafe(&self, sql: &str, params: &[Value]) -> Result<u64, ClientError> {
        self.dispatcher.execute_raw(RawSql::unchecked(sql, params)).await
    }

    /// Parameterised query; each row is decoded from a column-keyed object
    pub async fn query_raw<T: DeserializeOwned>(&self, raw: RawSql) -> Result<Vec<T>, ClientError> {
        self.dispatcher.query_raw(raw).await
    }

    pub async fn query_raw_unsafe<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, ClientError> {
        self.dispatcher.query_raw(RawSql::unchecked(sql, params)).await
    }
}

/// Client scoped to one open transaction
#[derive(Debug, Clone)]
pub struct TransactionClient {
    dispatcher: Dispatcher,
}

impl TransactionClient {
    model_delegates! {
        user => User,
        address => Address,
        admin => Admin,
        category => Category,
        product => Product,
        order => Order,
        delivery_info => DeliveryInfo,
        payment_info => PaymentInfo,
        review => Review,
    }

    pub async fn execute_raw(&self, raw: RawSql) -> Result<u64, ClientError> {
        self.dispatcher.execute_raw(raw).await
    }

    pub async fn execute_raw_unsafe(&self, sql: &str, params: &[Value]) -> Result<u64, ClientError> {
        self.dispatcher.execute_raw(RawSql::unchecked(sql, params)).await
    }

    pub async fn query_raw<T: DeserializeOwned>(&self, raw: RawSql) -> Result<Vec<T>, ClientError> {
        self.dispatcher.query_raw(raw).await
    }

    pub async fn query_raw_unsafe<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, ClientError> {
        self.dispatcher.query_raw(RawSql::unchecked(sql, params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::DatabaseConfig;

    fn offline_client() -> ShopClient {
        ShopClient::new(AppConfig::with_database(DatabaseConfig::from_url(
            "postgresql://localhost:1/shopdb",
        )))
        .unwrap()
    }

    #[test]
    fn test_invalid_url_is_initialization_error() {
        let err = ShopClient::new(AppConfig::with_database(DatabaseConfig::from_url(
            "mysql://localhost/shop",
        )))
        .unwrap_err();
        assert!(matches!(err, ClientError::Initialization { .. }));
        assert_eq!(err.code(), Some(codes::INVALID_URL));
    }

    #[test]
    fn test_pool_settings_are_not_url_errors() {
        let mut database = DatabaseConfig::from_url("postgres://localhost/shop");
        database.min_connections = 50;
        database.max_connections = 5;
        let err = ShopClient::new(AppConfig::with_database(database)).unwrap_err();
        assert_eq!(err.code(), Some(codes::INVALID_CONFIG));
        assert!(err.to_string().contains("min_connections"));

        let mut config = AppConfig::with_database(DatabaseConfig::from_url("postgres://localhost/shop"));
        config.transaction.max_wait_ms = 0;
        let err = ShopClient::new(config).unwrap_err();
        assert_eq!(err.code(), Some(codes::INVALID_CONFIG));
    }

    #[test]
    fn test_transaction_options_follow_config() {
        let mut config = AppConfig::with_database(DatabaseConfig::from_url("postgres://localhost/shop"));
        config.transaction.max_wait_ms = 250;
        config.transaction.timeout_ms = 1500;
        let client = ShopClient::new(config).unwrap();
        let options = client.transaction_options();
        assert_eq!(options.max_wait, std::time::Duration::from_millis(250));
        assert_eq!(options.timeout, std::time::Duration::from_millis(1500));
    }

    #[test]
    fn test_subscriptions() {
        let client = offline_client();
        let id = client.on(EventType::Query, |_| {});
        assert!(client.off(id));
        assert!(!client.off(id));
    }

    #[tokio::test]
    async fn test_not_connected_until_used() {
        let client = offline_client();
        assert!(!client.is_connected().await);
        client.disconnect().await;
        assert!(!client.is_connected().await);
    }
}
