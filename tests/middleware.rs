//! Middleware ordering, rewriting, short-circuiting and `extends` isolation
//!
//! Every chain here ends in a middleware that answers without calling
//! `next`, so no database is involved.

mod common;

use common::offline_client;
use shopdb::prelude::*;
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

/// Records `label:model.action` and passes the call on
struct Recorder {
    label: &'static str,
    log: Log,
}

#[async_trait]
impl Middleware for Recorder {
    async fn handle(&self, params: OperationParams, next: Next) -> Result<Value, ClientError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}.{}", self.label, params.model.name, params.action));
        next.run(params).await
    }
}

/// Answers every call with the given value
struct Answer(Value);

#[async_trait]
impl Middleware for Answer {
    async fn handle(&self, _params: OperationParams, _next: Next) -> Result<Value, ClientError> {
        Ok(self.0.clone())
    }
}

fn recorder(label: &'static str, log: &Log) -> Recorder {
    Recorder {
        label,
        log: Arc::clone(log),
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_short_circuit_never_reaches_engine() {
    let client = offline_client().extends(Answer(json!(42)));
    let count = client.user().count(CountArgs::new()).await.unwrap();
    assert_eq!(count, 42);
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_middleware_runs_in_registration_order() {
    let log: Log = Arc::default();
    let client = offline_client()
        .extends(recorder("outer", &log))
        .extends(recorder("inner", &log))
        .extends(Answer(json!({ "count": 3 })));

    let payload = client.review().delete_many(DeleteManyArgs::new()).await.unwrap();
    assert_eq!(payload.count, 3);
    assert_eq!(
        entries(&log),
        vec!["outer:Review.deleteMany", "inner:Review.deleteMany"]
    );
}

#[tokio::test]
async fn test_middleware_can_rewrite_params() {
    let log: Log = Arc::default();
    let client = offline_client()
        .extends(middleware_fn(|mut params: OperationParams, next: Next| async move {
            if let QueryArgs::Find(args) = &mut params.args {
                args.take = Some(5);
            }
            params.action = Action::FindFirst;
            next.run(params).await
        }))
        .extends(recorder("seen", &log))
        .extends(middleware_fn(|params: OperationParams, _next: Next| async move {
            let take = match &params.args {
                QueryArgs::Find(args) => args.take,
                _ => None,
            };
            Ok(json!([{ "take": take, "action": params.action.as_str() }]))
        }));

    let rows: Vec<Value> = client
        .category()
        .find_many(FindArgs::new())
        .with_shape()
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({ "take": 5, "action": "findFirst" })]);
    assert_eq!(entries(&log), vec!["seen:Category.findFirst"]);
}

#[tokio::test]
async fn test_middleware_can_post_process() {
    let client = offline_client()
        .extends(middleware_fn(|params: OperationParams, next: Next| async move {
            let mut value = next.run(params).await?;
            if let Some(count) = value.get_mut("count") {
                *count = json!(count.as_i64().unwrap_or(0) * 10);
            }
            Ok(value)
        }))
        .extends(Answer(json!({ "count": 2 })));

    let payload = client
        .product()
        .update_many(UpdateManyArgs::new(UpdateData::new().increment("sold", 1)))
        .await
        .unwrap();
    assert_eq!(payload.count, 20);
}

#[tokio::test]
async fn test_errors_from_middleware_propagate() {
    let client = offline_client().extends(middleware_fn(|params: OperationParams, _next: Next| async move {
        Err(ClientError::validation(
            params.model.name,
            params.action.as_str(),
            "blocked",
        ))
    }));
    let err = client.admin().find_many(FindArgs::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid `Admin.findMany()` invocation: blocked");
}

#[tokio::test]
async fn test_extends_leaves_original_untouched() {
    let base_log: Log = Arc::default();
    let extra_log: Log = Arc::default();
    let base = offline_client();
    let extended = base
        .extends(recorder("extra", &extra_log))
        .extends(Answer(json!(1)));

    let _ = extended.user().count(CountArgs::new()).await.unwrap();
    assert_eq!(entries(&extra_log), vec!["extra:User.count"]);

    // The base client has no answering middleware; validation still fails
    // offline before any connection attempt.
    #[allow(deprecated)]
    base.use_middleware(recorder("base", &base_log));
    let err = base
        .user()
        .find_unique(UniqueWhere::new("name", "nobody"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(entries(&base_log), vec!["base:User.findUnique"]);
    assert_eq!(entries(&extra_log), vec!["extra:User.count"]);
}

#[tokio::test]
async fn test_use_middleware_applies_to_clones() {
    let log: Log = Arc::default();
    let client = offline_client();
    let clone = client.clone();
    #[allow(deprecated)]
    client.use_middleware(recorder("shared", &log));
    #[allow(deprecated)]
    client.use_middleware(Answer(json!(0)));

    assert_eq!(clone.order().count(CountArgs::new()).await.unwrap(), 0);
    assert_eq!(entries(&log), vec!["shared:Order.count"]);
}

#[tokio::test]
async fn test_params_describe_the_call() {
    let seen: Arc<Mutex<Option<OperationParams>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let client = offline_client().extends(middleware_fn(move |params: OperationParams, _next: Next| {
        let sink = Arc::clone(&sink);
        async move {
            *sink.lock().unwrap() = Some(params);
            Ok(Value::Null)
        }
    }));

    let user_id = Uuid::new_v4();
    let addresses: Option<Vec<Address>> = client
        .user()
        .find_unique(User::by_id(user_id))
        .relation("addresses", FindArgs::new())
        .await
        .unwrap();
    assert!(addresses.is_none());

    let params = seen.lock().unwrap().take().unwrap();
    assert_eq!(params.model.name, "User");
    assert_eq!(params.action, Action::FindUnique);
    assert_eq!(params.data_path, vec!["addresses".to_string()]);
    assert!(!params.run_in_transaction);
}

#[tokio::test]
async fn test_count_fields_always_counts_all_rows() {
    let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let client = offline_client().extends(middleware_fn(move |params: OperationParams, _next: Next| {
        let sink = Arc::clone(&sink);
        async move {
            if let QueryArgs::Count(args) = &params.args {
                sink.lock().unwrap().push(args.select.clone());
            }
            Ok(json!({ "_all": 4, "price": 4 }))
        }
    }));

    let counts = client
        .product()
        .count_fields(CountArgs::new().select("price"))
        .await
        .unwrap();
    assert_eq!(counts.all(), 4);
    client.product().count_fields(CountArgs::new()).await.unwrap();
    client
        .product()
        .count_fields(CountArgs::new().select("_all").select("model"))
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            vec!["_all".to_string(), "price".to_string()],
            vec!["_all".to_string()],
            vec!["_all".to_string(), "model".to_string()],
        ]
    );
}
