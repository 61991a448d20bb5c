use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::{Category, Order, Review};

#[model]
#[table(name = "Product")]
pub struct Product {
    #[primary_key]
    pub id: Uuid,

    pub name: String,

    #[field(unique)]
    pub slug: String,

    pub price: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub rating: Option<f64>,

    #[field(default)]
    pub sold: i32,

    pub model: Option<String>,

    #[field(default)]
    pub quantity: i32,

    #[field(default)]
    pub status: String,

    pub images: Vec<String>,
    pub videos: Vec<String>,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    #[serde(rename = "categoriesId")]
    pub categories_id: Uuid,

    #[serde(rename = "orderId")]
    pub order_id: Option<Uuid>,

    #[relation(one, model = Category, fields = "categoriesId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Box<Category>>,

    #[relation(many, model = Review, references = "productsId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,

    #[relation(one, model = Order, fields = "orderId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Box<Order>>,
}
