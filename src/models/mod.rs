//! The nine entity models
//!
//! Column names follow the database schema (`createdAt`, `region_state`,
//! ...) through `#[serde(rename)]`; Rust fields are snake_case. Relation
//! fields are only populated when the query selects or includes them.

mod address;
mod admin;
mod category;
mod delivery_info;
mod order;
mod payment_info;
mod product;
mod review;
mod user;

pub use address::Address;
pub use admin::Admin;
pub use category::Category;
pub use delivery_info::DeliveryInfo;
pub use order::Order;
pub use payment_info::PaymentInfo;
pub use product::Product;
pub use review::Review;
pub use user::User;

use query_engine::{Model, ModelDef};

/// Schema metadata of every model the client serves
pub fn all_models() -> [&'static ModelDef; 9] {
    [
        User::def(),
        Address::def(),
        Admin::def(),
        Category::def(),
        Product::def(),
        Order::def(),
        DeliveryInfo::def(),
        PaymentInfo::def(),
        Review::def(),
    ]
}
