//! Batch and interactive transactions, raw queries and query events

mod common;

use common::{create_category, unique};
use shopdb::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn test_batch_commits_in_order() {
    let Some(client) = common::client().await else { return };

    let marker = unique("batch");
    let results = client
        .transaction_batch(vec![
            client
                .category()
                .create(CreateArgs::new(CreateData::new().set("name", "one").set("img", &marker)))
                .into(),
            client
                .category()
                .create(CreateArgs::new(CreateData::new().set("name", "two").set("img", &marker)))
                .into(),
            client
                .category()
                .count(CountArgs::new().filter(QueryFilter::equals("img", &marker)))
                .into(),
        ])
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    let first: Category = results.decode(0).unwrap();
    assert_eq!(first.name, "one");
    assert_eq!(results.decode::<i64>(2).unwrap(), 2);
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let Some(client) = common::client().await else { return };

    let marker = unique("rollback");
    let err = client
        .transaction_batch(vec![
            client
                .category()
                .create(CreateArgs::new(CreateData::new().set("name", "kept?").set("img", &marker)))
                .into(),
            client
                .category()
                .update(UpdateArgs::new(
                    Category::by_id(Uuid::new_v4()),
                    UpdateData::new().set("name", "missing"),
                ))
                .into(),
        ])
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let count = client
        .category()
        .count(CountArgs::new().filter(QueryFilter::equals("img", &marker)))
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_interactive_commit_and_rollback() {
    let Some(client) = common::client().await else { return };

    let category_id = create_category(&client, "Tx").await.id;
    let slug = unique("tx");
    let created = client
        .transaction(client.transaction_options(), |tx| {
            let slug = slug.clone();
            async move {
                let product = tx
                    .product()
                    .create(CreateArgs::new(
                        CreateData::new()
                            .set("name", "In tx")
                            .set("slug", &slug)
                            .set("categoriesId", category_id),
                    ))
                    .await?;
                let seen = tx.product().find_unique(Product::by_slug(slug)).await?;
                assert_eq!(seen.as_ref().map(|p| p.id), Some(product.id));
                Ok(product)
            }
        })
        .await
        .unwrap();
    assert!(client.product().find_unique(Product::by_id(created.id)).await.unwrap().is_some());

    let doomed = unique("doomed");
    let err = client
        .transaction(client.transaction_options(), |tx| {
            let doomed = doomed.clone();
            async move {
                tx.product()
                    .create(CreateArgs::new(
                        CreateData::new()
                            .set("name", "Rolled back")
                            .set("slug", &doomed)
                            .set("categoriesId", category_id),
                    ))
                    .await?;
                Err::<(), _>(ClientError::known(codes::WRITE_CONFLICT, "caller gave up"))
            }
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::WRITE_CONFLICT));
    assert!(client.product().find_unique(Product::by_slug(doomed)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_interactive_timeout_rolls_back() {
    let Some(client) = common::client().await else { return };

    let marker = unique("slow");
    let options = client.transaction_options().timeout(Duration::from_millis(200));
    let err = client
        .transaction(options, |tx| {
            let marker = marker.clone();
            async move {
                tx.category()
                    .create(CreateArgs::new(CreateData::new().set("name", "slow").set("img", &marker)))
                    .await?;
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(())
            }
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::TRANSACTION_API));

    let count = client
        .category()
        .count(CountArgs::new().filter(QueryFilter::equals("img", &marker)))
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_handle_unusable_after_commit() {
    let Some(client) = common::client().await else { return };

    let leaked = client
        .transaction(client.transaction_options(), |tx| async move { Ok(tx) })
        .await
        .unwrap();
    let err = leaked.category().count(CountArgs::new()).await.unwrap_err();
    assert_eq!(err.code(), Some(codes::TRANSACTION_API));
}

#[tokio::test]
async fn test_isolation_level_applies() {
    let Some(client) = common::client().await else { return };

    let options = client
        .transaction_options()
        .isolation_level(IsolationLevel::Serializable);
    let level: Vec<Value> = client
        .transaction(options, |tx| async move {
            tx.query_raw(RawSql::new("SELECT current_setting('transaction_isolation') AS level"))
                .await
        })
        .await
        .unwrap();
    assert_eq!(level, vec![json!({ "level": "serializable" })]);
}

#[tokio::test]
async fn test_middleware_sees_transaction_flag() {
    let Some(client) = common::client().await else { return };

    let flags: Arc<Mutex<Vec<(String, bool)>>> = Arc::default();
    let sink = Arc::clone(&flags);
    let client = client.extends(middleware_fn(move |params: OperationParams, next: Next| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock()
                .unwrap()
                .push((params.action.to_string(), params.run_in_transaction));
            next.run(params).await
        }
    }));

    client.category().count(CountArgs::new()).await.unwrap();
    client
        .transaction_batch(vec![client.category().count(CountArgs::new()).into()])
        .await
        .unwrap();
    client
        .transaction(client.transaction_options(), |tx| async move {
            tx.category().find_first(FindArgs::new()).await
        })
        .await
        .unwrap();

    assert_eq!(
        *flags.lock().unwrap(),
        vec![
            ("count".to_string(), false),
            ("count".to_string(), true),
            ("findFirst".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_raw_queries() {
    let Some(client) = common::client().await else { return };

    let marker = unique("raw");
    let inserted = client
        .execute_raw(
            RawSql::new(r#"INSERT INTO "Category" ("id", "name", "img") VALUES ("#)
                .bind(Uuid::new_v4())
                .push(", ")
                .bind("raw one")
                .push(", ")
                .bind(marker.as_str())
                .push(")"),
        )
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let affected = client
        .execute_raw_unsafe(
            r#"UPDATE "Category" SET "name" = $1 WHERE "img" = $2"#,
            &[json!("raw renamed"), json!(marker)],
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        name: String,
    }
    let rows: Vec<Row> = client
        .query_raw(
            RawSql::new(r#"SELECT "name" FROM "Category" WHERE "img" = "#).bind(marker.as_str()),
        )
        .await
        .unwrap();
    assert_eq!(rows, vec![Row { name: "raw renamed".to_string() }]);

    let rows: Vec<Value> = client
        .query_raw_unsafe(r#"SELECT count(*)::int AS n FROM "Category" WHERE "img" = $1"#, &[json!(marker)])
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({ "n": 1 })]);
}

#[tokio::test]
async fn test_query_events_and_reconnect() {
    let Some(client) = common::client_with(|config| config.with_log(LogLevel::Query, LogEmit::Event)).await else {
        return;
    };

    let queries: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&queries);
    let id = client.on(EventType::Query, move |event| {
        if let Some(query) = event.as_query() {
            sink.lock().unwrap().push(query.query.clone());
        }
    });

    client.connect().await.unwrap();
    assert!(client.is_connected().await);
    client.disconnect().await;
    assert!(!client.is_connected().await);

    // Operations reconnect on demand
    client.admin().count(CountArgs::new()).await.unwrap();
    assert!(client.is_connected().await);
    assert!(queries.lock().unwrap().iter().any(|q| q.contains(r#""Admin""#)));

    assert!(client.off(id));
    let before = queries.lock().unwrap().len();
    client.admin().count(CountArgs::new()).await.unwrap();
    assert_eq!(queries.lock().unwrap().len(), before);
}
