//! Relation loading, relation filters and nested writes

mod common;

use common::{create_category, create_product, create_user, unique};
use shopdb::prelude::*;

async fn create_address(client: &ShopClient, city: &str, owner: Option<Uuid>) -> Address {
    let mut data = CreateData::new().set("city", city).set("region_state", "North");
    if let Some(owner) = owner {
        data = data.set("userId", owner);
    }
    client.address().create(CreateArgs::new(data)).await.unwrap()
}

#[tokio::test]
async fn test_product_with_category_and_image_push() {
    let Some(client) = common::client().await else { return };

    let shoes = create_category(&client, "Shoes").await;
    let slug = unique("sneaker");
    client
        .product()
        .create(CreateArgs::new(
            CreateData::new()
                .set("name", "Sneaker")
                .set("slug", &slug)
                .set("categoriesId", shoes.id)
                .set("images", vec!["a.png"]),
        ))
        .await
        .unwrap();

    let product = client
        .product()
        .find_unique_with(FindUniqueArgs::new(Product::by_slug(slug.clone())).include("category"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.category.as_ref().map(|c| c.name.as_str()), Some("Shoes"));

    let updated = client
        .product()
        .update(UpdateArgs::new(
            Product::by_slug(slug.clone()),
            UpdateData::new().push("images", "b.png"),
        ))
        .await
        .unwrap();
    assert_eq!(updated.images, vec!["a.png", "b.png"]);

    let updated = client
        .product()
        .update(UpdateArgs::new(
            Product::by_slug(slug),
            UpdateData::new().push("images", vec!["a.png", "c.png"]),
        ))
        .await
        .unwrap();
    assert_eq!(updated.images, vec!["a.png", "b.png", "a.png", "c.png"]);
}

#[tokio::test]
async fn test_user_addresses_exclude_unowned() {
    let Some(client) = common::client().await else { return };

    let user = create_user(&client, "owner").await;
    let first = create_address(&client, "Paris", Some(user.id)).await;
    let second = create_address(&client, "Lille", Some(user.id)).await;
    let stray = create_address(&client, "Nowhere", None).await;
    assert_eq!(stray.user_id, None);

    let addresses: Option<Vec<Address>> = client
        .user()
        .find_unique(User::by_id(user.id))
        .relation("addresses", FindArgs::new().order_by(OrderBy::asc("city")))
        .await
        .unwrap();
    let ids: Vec<Uuid> = addresses.unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let with_addresses = client
        .user()
        .find_unique_with(FindUniqueArgs::new(User::by_id(user.id)).include("addresses"))
        .await
        .unwrap()
        .unwrap();
    let loaded = with_addresses.addresses.unwrap();
    assert_eq!(loaded.len(), 2);
    assert!(loaded.iter().all(|a| a.user_id == Some(user.id)));
    assert!(with_addresses.reviews.is_none());
}

#[tokio::test]
async fn test_fluent_access_on_missing_row_is_none() {
    let Some(client) = common::client().await else { return };

    let addresses: Option<Vec<Address>> = client
        .user()
        .find_unique(User::by_id(Uuid::new_v4()))
        .relation("addresses", FindArgs::new())
        .await
        .unwrap();
    assert!(addresses.is_none());
}

#[tokio::test]
async fn test_missing_optional_to_one_is_none() {
    let Some(client) = common::client().await else { return };

    let stray = create_address(&client, "Unowned", None).await;
    let owner: Option<User> = client
        .address()
        .find_unique(Address::by_id(stray.id))
        .relation("users", FindArgs::new())
        .await
        .unwrap();
    assert!(owner.is_none());

    let loaded = client
        .address()
        .find_unique_with(FindUniqueArgs::new(Address::by_id(stray.id)).include("users"))
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.users.is_none());
}

#[tokio::test]
async fn test_nested_include_with_filter_and_paging() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Nested").await;
    for i in 0..4 {
        client
            .product()
            .create(CreateArgs::new(
                CreateData::new()
                    .set("name", format!("p{}", i))
                    .set("slug", unique("nested"))
                    .set("categoriesId", category.id)
                    .set("sold", i * 10),
            ))
            .await
            .unwrap();
    }

    let loaded = client
        .category()
        .find_unique_with(
            FindUniqueArgs::new(Category::by_id(category.id))
                .include_with(
                    "products",
                    FindArgs::new()
                        .filter(QueryFilter::field("sold", IntFilter::new().gt(0)))
                        .order_by(OrderBy::desc("sold"))
                        .take(2),
                )
                .include_count("products"),
        )
        .with_shape::<Option<Value>>()
        .await
        .unwrap()
        .unwrap();

    let names: Vec<&str> = loaded["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["p3", "p2"]);
    assert_eq!(loaded["_count"]["products"], json!(4));
}

#[tokio::test]
async fn test_select_and_omit_projections() {
    let Some(client) = common::client().await else { return };

    let user = client
        .user()
        .create(CreateArgs::new(
            CreateData::new()
                .set("name", "Private")
                .set("email", format!("{}@example.com", unique("private")))
                .set("password", "hunter2"),
        ))
        .await
        .unwrap();

    let selected: Option<Value> = client
        .user()
        .find_unique_with(FindUniqueArgs::new(User::by_id(user.id)).select("name"))
        .with_shape()
        .await
        .unwrap();
    assert_eq!(selected, Some(json!({ "name": "Private" })));

    let omitted: Option<Value> = client
        .user()
        .find_unique_with(FindUniqueArgs::new(User::by_id(user.id)).omit("password"))
        .with_shape()
        .await
        .unwrap();
    let omitted = omitted.unwrap();
    assert!(omitted.get("password").is_none());
    assert_eq!(omitted["email"], json!(user.email));
}

#[tokio::test]
async fn test_relation_filters() {
    let Some(client) = common::client().await else { return };

    let reviewer = create_user(&client, "reviewer").await;
    let quiet = create_user(&client, "quiet").await;
    let category = create_category(&client, "Reviewed").await;
    let product = create_product(&client, &category, "reviewed").await;
    for rating in [2.0, 5.0] {
        client
            .review()
            .create(CreateArgs::new(
                CreateData::new()
                    .set("comment", "ok")
                    .set("rating", rating)
                    .set("usersId", reviewer.id)
                    .set("productsId", product.id),
            ))
            .await
            .unwrap();
    }

    let ours = || {
        QueryFilter::field(
            "id",
            UuidFilter::new().in_([reviewer.id, quiet.id]),
        )
    };
    let find = |filter: QueryFilter| {
        let client = client.clone();
        let filter = QueryFilter::and(vec![ours(), filter]);
        async move {
            let mut names: Vec<String> = client
                .user()
                .find_many(FindArgs::new().filter(filter))
                .await
                .unwrap()
                .into_iter()
                .map(|u| u.name)
                .collect();
            names.sort();
            names
        }
    };

    let high = || QueryFilter::field("rating", FloatFilter::new().gte(4.0));
    assert_eq!(find(QueryFilter::some("reviews", high())).await, vec!["reviewer"]);
    assert_eq!(find(QueryFilter::none("reviews", high())).await, vec!["quiet"]);
    // `every` holds vacuously for users without reviews
    assert_eq!(find(QueryFilter::every("reviews", high())).await, vec!["quiet"]);

    let by_category = client
        .review()
        .count(CountArgs::new().filter(QueryFilter::is(
            "products",
            QueryFilter::is("category", QueryFilter::equals("name", "Reviewed")),
        ).and_also(QueryFilter::equals("usersId", reviewer.id))))
        .await
        .unwrap();
    assert_eq!(by_category, 2);

    let unlinked = client
        .review()
        .count(CountArgs::new().filter(QueryFilter::and(vec![
            QueryFilter::equals("usersId", reviewer.id),
            QueryFilter::relation_absent("products"),
        ])))
        .await
        .unwrap();
    assert_eq!(unlinked, 0);
}

#[tokio::test]
async fn test_nested_create_and_connect() {
    let Some(client) = common::client().await else { return };

    let email = format!("{}@example.com", unique("nested"));
    let user = client
        .user()
        .create(
            CreateArgs::new(
                CreateData::new()
                    .set("name", "Nested")
                    .set("email", &email)
                    .create_related("addresses", CreateData::new().set("city", "Nantes").set("region_state", "West"))
                    .create_related("addresses", CreateData::new().set("city", "Brest").set("region_state", "West")),
            )
            .include("addresses"),
        )
        .await
        .unwrap();
    assert_eq!(user.addresses.as_ref().map(Vec::len), Some(2));

    let stray = create_address(&client, "Rennes", None).await;
    let connected = client
        .address()
        .update(UpdateArgs::new(
            Address::by_id(stray.id),
            UpdateData::new().connect("users", User::by_email(email.clone())),
        ))
        .await
        .unwrap();
    assert_eq!(connected.user_id, Some(user.id));

    let released = client
        .address()
        .update(UpdateArgs::new(
            Address::by_id(stray.id),
            UpdateData::new().disconnect_current("users"),
        ))
        .await
        .unwrap();
    assert_eq!(released.user_id, None);

    let shoes = client
        .product()
        .create(
            CreateArgs::new(
                CreateData::new()
                    .set("name", "Loafer")
                    .set("slug", unique("loafer"))
                    .create_related("category", CreateData::new().set("name", "Created inline")),
            )
            .include("category"),
        )
        .await
        .unwrap();
    assert_eq!(shoes.category.map(|c| c.name), Some("Created inline".to_string()));
}

#[tokio::test]
async fn test_failed_nested_write_rolls_back() {
    let Some(client) = common::client().await else { return };

    let email = format!("{}@example.com", unique("atomic"));
    let err = client
        .user()
        .create(CreateArgs::new(
            CreateData::new()
                .set("name", "Atomic")
                .set("email", &email)
                .connect("addresses", Address::by_id(Uuid::new_v4())),
        ))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{:?}", err);

    let found = client.user().find_unique(User::by_email(email)).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_cursor_pagination() {
    let Some(client) = common::client().await else { return };

    let marker = unique("cursor");
    let mut ids = Vec::new();
    for i in 0..5 {
        let category = client
            .category()
            .create(CreateArgs::new(CreateData::new().set("name", format!("n{}", i)).set("img", &marker)))
            .await
            .unwrap();
        ids.push(category.id);
    }
    let page = |args: FindArgs| {
        let client = client.clone();
        let args = args.filter(QueryFilter::equals("img", &marker)).order_by(OrderBy::asc("name"));
        async move {
            client
                .category()
                .find_many(args)
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(page(FindArgs::new().cursor(Category::by_id(ids[2])).take(2)).await, vec!["n2", "n3"]);
    assert_eq!(page(FindArgs::new().cursor(Category::by_id(ids[2])).skip(1).take(2)).await, vec!["n3", "n4"]);
    assert_eq!(page(FindArgs::new().cursor(Category::by_id(ids[2])).take(-2)).await, vec!["n1", "n2"]);
    assert!(page(FindArgs::new().cursor(Category::by_id(Uuid::new_v4())).take(2)).await.is_empty());
    assert_eq!(page(FindArgs::new().take(-2)).await, vec!["n3", "n4"]);
}

#[tokio::test]
async fn test_distinct() {
    let Some(client) = common::client().await else { return };

    let category = create_category(&client, "Distinct").await;
    for (name, status) in [("a", "active"), ("b", "archived"), ("c", "active")] {
        client
            .product()
            .create(CreateArgs::new(
                CreateData::new()
                    .set("name", name)
                    .set("slug", unique("distinct"))
                    .set("status", status)
                    .set("categoriesId", category.id),
            ))
            .await
            .unwrap();
    }
    let rows = client
        .product()
        .find_many(
            FindArgs::new()
                .filter(QueryFilter::equals("categoriesId", category.id))
                .distinct("status")
                .order_by(OrderBy::desc("name")),
        )
        .await
        .unwrap();
    let names: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["c", "b"]);
}
