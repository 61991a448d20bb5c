//! Create / read / update / delete round trips against PostgreSQL

mod common;

use common::{create_category, create_product, create_user, unique};
use shopdb::prelude::*;

#[tokio::test]
async fn test_create_then_find_unique_round_trip() {
    let Some(client) = common::client().await else { return };

    let email = format!("{}@example.com", unique("ada"));
    let created = client
        .user()
        .create(CreateArgs::new(
            CreateData::new()
                .set("name", "Ada")
                .set("email", &email)
                .set("phone", "+33 1 23 45 67 89"),
        ))
        .await
        .unwrap();
    assert_eq!(created.name, "Ada");
    assert_eq!(created.avatar, None);
    assert_eq!(created.created_at, created.updated_at);

    let by_id = client.user().find_unique(User::by_id(created.id)).await.unwrap();
    assert_eq!(by_id.as_ref(), Some(&created));

    let by_email = client.user().find_unique(User::by_email(email.clone())).await.unwrap();
    assert_eq!(by_email, Some(created.clone()));

    let narrowed = client
        .user()
        .find_unique(User::by_email(email).and(QueryFilter::equals("name", "Someone else")))
        .await
        .unwrap();
    assert_eq!(narrowed, None);
}

#[tokio::test]
async fn test_store_defaults_and_client_values() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Defaults").await;
    let product = create_product(&client, &category, "plain").await;
    assert_eq!(product.sold, 0);
    assert_eq!(product.quantity, 1);
    assert_eq!(product.status, "active");
    assert!(product.images.is_empty());
    assert!(product.videos.is_empty());
    assert!(product.category.is_none());

    let admin = client
        .admin()
        .create(CreateArgs::new(
            CreateData::new()
                .set("name", "Root")
                .set("phone", "000")
                .set("password", "secret"),
        ))
        .await
        .unwrap();
    assert_eq!(admin.role, "admin");

    let payment = client
        .payment_info()
        .create(CreateArgs::new(CreateData::new().set("total_paid", 12.5)))
        .await
        .unwrap();
    assert_eq!(payment.payment_method, "cash_on_delivery");

    let order = client
        .order()
        .create(CreateArgs::new(
            CreateData::new()
                .set("subtotal", 10.0)
                .set("delivery_cost", 2.5)
                .set("total", 12.5)
                .set("usersId", Uuid::new_v4())
                .set("paymentInfoId", payment.id),
        ))
        .await
        .unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.payment_info_id, Some(payment.id));
}

#[tokio::test]
async fn test_caller_supplied_id_is_kept() {
    let Some(client) = common::client().await else { return };

    let id = Uuid::new_v4();
    let category = client
        .category()
        .create(CreateArgs::new(CreateData::new().set("id", id).set("name", "Fixed id")))
        .await
        .unwrap();
    assert_eq!(category.id, id);
}

#[tokio::test]
async fn test_update_reflects_data_and_bumps_updated_at() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Updates").await;
    let product = create_product(&client, &category, "lamp").await;

    let updated = client
        .product()
        .update(UpdateArgs::new(
            Product::by_id(product.id),
            UpdateData::new()
                .set("name", "Desk lamp")
                .set("price", 20.0)
                .set("model", "L-1")
                .increment("sold", 3)
                .multiply("quantity", 4),
        ))
        .await
        .unwrap();
    assert_eq!(updated.name, "Desk lamp");
    assert_eq!(updated.price, Some(20.0));
    assert_eq!(updated.sold, 3);
    assert_eq!(updated.quantity, 4);
    assert!(updated.updated_at > product.updated_at);
    assert_eq!(updated.created_at, product.created_at);

    let found = client
        .product()
        .find_unique_or_throw(Product::by_id(product.id))
        .await
        .unwrap();
    assert_eq!(found, updated);

    let cleared = client
        .product()
        .update(UpdateArgs::new(
            Product::by_id(product.id),
            UpdateData::new().set_null("model").decrement("sold", 1),
        ))
        .await
        .unwrap();
    assert_eq!(cleared.model, None);
    assert_eq!(cleared.sold, 2);
    assert!(cleared.updated_at > updated.updated_at);
}

#[tokio::test]
async fn test_update_missing_row_is_not_found() {
    let Some(client) = common::client().await else { return };

    let err = client
        .category()
        .update(UpdateArgs::new(
            Category::by_id(Uuid::new_v4()),
            UpdateData::new().set("name", "ghost"),
        ))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);
}

#[tokio::test]
async fn test_delete_then_lookup() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Short lived").await;
    let deleted = client
        .category()
        .delete(DeleteArgs::new(Category::by_id(category.id)))
        .await
        .unwrap();
    assert_eq!(deleted, category);

    let found = client.category().find_unique(Category::by_id(category.id)).await.unwrap();
    assert!(found.is_none());

    let err = client
        .category()
        .find_unique_or_throw(Category::by_id(category.id))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::NOT_FOUND));

    let err = client
        .category()
        .delete(DeleteArgs::new(Category::by_id(category.id)))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_unique_violation_is_known_error() {
    let Some(client) = common::client().await else { return };

    let user = create_user(&client, "dup").await;
    let err = client
        .user()
        .create(CreateArgs::new(
            CreateData::new().set("name", "Copy").set("email", &user.email),
        ))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "{:?}", err);
}

#[tokio::test]
async fn test_missing_required_foreign_key_target() {
    let Some(client) = common::client().await else { return };

    let err = client
        .product()
        .create(CreateArgs::new(
            CreateData::new()
                .set("name", "Orphan")
                .set("slug", unique("orphan"))
                .set("categoriesId", Uuid::new_v4()),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::FOREIGN_KEY_VIOLATION));
}

#[tokio::test]
async fn test_create_many_duplicates_fail_atomically() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Batch").await;
    let slug = unique("twin");
    let row = CreateData::new()
        .set("name", "Twin")
        .set("slug", &slug)
        .set("categoriesId", category.id);

    let err = client
        .product()
        .create_many(CreateManyArgs::new(vec![row.clone(), row.clone()]))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
    let persisted = client
        .product()
        .count(CountArgs::new().filter(QueryFilter::equals("slug", &slug)))
        .await
        .unwrap();
    assert_eq!(persisted, 0);

    let payload = client
        .product()
        .create_many(CreateManyArgs::new(vec![row.clone(), row]).skip_duplicates(true))
        .await
        .unwrap();
    assert_eq!(payload.count, 1);
    let persisted = client
        .product()
        .count(CountArgs::new().filter(QueryFilter::equals("slug", &slug)))
        .await
        .unwrap();
    assert_eq!(persisted, 1);
}

#[tokio::test]
async fn test_create_many_and_return_keeps_input_order() {
    let Some(client) = common::client().await else { return };

    let marker = unique("ordered");
    let rows = (0..5)
        .map(|i| {
            CreateData::new()
                .set("name", format!("{}-{}", marker, i))
                .set("img", &marker)
        })
        .collect();
    let created = client
        .category()
        .create_many_and_return(CreateManyArgs::new(rows))
        .await
        .unwrap();
    let names: Vec<String> = created.into_iter().map(|c| c.name).collect();
    let expected: Vec<String> = (0..5).map(|i| format!("{}-{}", marker, i)).collect();
    assert_eq!(names, expected);

    let rows = (0..6)
        .map(|i| CreateData::new().set("name", format!("{}-p{}", marker, i)).set("img", &marker))
        .collect();
    let projected: Vec<Value> = client
        .category()
        .create_many_and_return(CreateManyArgs::new(rows).select("name"))
        .with_shape()
        .await
        .unwrap();
    let expected: Vec<Value> = (0..6).map(|i| json!({ "name": format!("{}-p{}", marker, i) })).collect();
    assert_eq!(projected, expected);
}

#[tokio::test]
async fn test_update_many_and_delete_many_with_limit() {
    let Some(client) = common::client().await else { return };

    let marker = unique("bulk");
    let rows = (0..4).map(|i| CreateData::new().set("name", format!("c{}", i)).set("img", &marker)).collect();
    client.category().create_many(CreateManyArgs::new(rows)).await.unwrap();
    let marked = || QueryFilter::equals("img", &marker);

    let payload = client
        .category()
        .update_many(UpdateManyArgs::new(UpdateData::new().set("name", "renamed")).filter(marked()).limit(3))
        .await
        .unwrap();
    assert_eq!(payload.count, 3);

    let renamed = client
        .category()
        .update_many_and_return(
            UpdateManyArgs::new(UpdateData::new().set("name", "again"))
                .filter(QueryFilter::and(vec![marked(), QueryFilter::equals("name", "renamed")])),
        )
        .await
        .unwrap();
    assert_eq!(renamed.len(), 3);
    assert!(renamed.iter().all(|c| c.name == "again"));

    let deleted = client
        .category()
        .delete_many(DeleteManyArgs::new().filter(marked()).limit(1))
        .await
        .unwrap();
    assert_eq!(deleted.count, 1);
    let left = client.category().count(CountArgs::new().filter(marked())).await.unwrap();
    assert_eq!(left, 3);
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let Some(client) = common::client().await else { return };

    let email = format!("{}@example.com", unique("upsert"));
    let args = || {
        UpsertArgs::new(
            User::by_email(email.clone()),
            CreateData::new().set("name", "First").set("email", &email),
            UpdateData::new().set("name", "First"),
        )
    };

    let first = client.user().upsert(args()).await.unwrap();
    let second = client.user().upsert(args()).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.name, second.name);
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at > first.updated_at);

    let count = client
        .user()
        .count(CountArgs::new().filter(QueryFilter::equals("email", &email)))
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_count_matches_find_many() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Counting").await;
    for (i, price) in [5.0, 15.0, 25.0, 35.0].into_iter().enumerate() {
        client
            .product()
            .create(CreateArgs::new(
                CreateData::new()
                    .set("name", format!("item {}", i))
                    .set("slug", unique("count"))
                    .set("price", price)
                    .set("categoriesId", category.id)
                    .set("images", if i % 2 == 0 { vec!["x.png"] } else { vec![] }),
            ))
            .await
            .unwrap();
    }

    let in_category = || QueryFilter::equals("categoriesId", category.id);
    let filters = vec![
        in_category(),
        QueryFilter::and(vec![in_category(), QueryFilter::field("price", FloatFilter::new().gte(15.0))]),
        QueryFilter::and(vec![
            in_category(),
            QueryFilter::or(vec![
                QueryFilter::field("price", FloatFilter::new().lt(10.0)),
                QueryFilter::field("images", ListFilter::new().has("x.png")),
            ]),
        ]),
        QueryFilter::and(vec![
            in_category(),
            QueryFilter::not(vec![QueryFilter::field("name", StringFilter::new().ends_with("3"))]),
        ]),
        QueryFilter::and(vec![in_category(), QueryFilter::or(vec![])]),
    ];
    for filter in filters {
        let rows = client
            .product()
            .find_many(FindArgs::new().filter(filter.clone()))
            .await
            .unwrap();
        let count = client.product().count(CountArgs::new().filter(filter)).await.unwrap();
        assert_eq!(count, rows.len() as i64);
    }

    let fields = client
        .product()
        .count_fields(CountArgs::new().filter(in_category()).select("price").select("model"))
        .await
        .unwrap();
    assert_eq!(fields.all(), 4);
    assert_eq!(fields.field("price"), Some(4));
    assert_eq!(fields.field("model"), Some(0));
}

#[tokio::test]
async fn test_string_filters() {
    let Some(client) = common::client().await else { return };

    let marker = unique("strings");
    for name in ["Alpha", "alphabet", "Beta"] {
        client
            .category()
            .create(CreateArgs::new(CreateData::new().set("name", name).set("img", &marker)))
            .await
            .unwrap();
    }
    let names = |filter: StringFilter| {
        let client = client.clone();
        let marker = marker.clone();
        async move {
            let mut rows: Vec<String> = client
                .category()
                .find_many(FindArgs::new().filter(QueryFilter::and(vec![
                    QueryFilter::equals("img", &marker),
                    QueryFilter::field("name", filter),
                ])))
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect();
            rows.sort();
            rows
        }
    };

    assert_eq!(names(StringFilter::new().starts_with("Alpha")).await, vec!["Alpha"]);
    assert_eq!(
        names(StringFilter::new().starts_with("alpha").insensitive()).await,
        vec!["Alpha", "alphabet"]
    );
    assert_eq!(names(StringFilter::new().contains("et")).await, vec!["Beta", "alphabet"]);
    assert_eq!(
        names(StringFilter::new().in_(["Beta", "Gamma"])).await,
        vec!["Beta"]
    );
    assert!(names(StringFilter::new().in_(Vec::<String>::new())).await.is_empty());
    assert_eq!(names(StringFilter::new().not_in(Vec::<String>::new())).await.len(), 3);
}
