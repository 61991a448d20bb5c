use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::Product;

#[model]
#[table(name = "Category")]
pub struct Category {
    #[primary_key]
    pub id: Uuid,

    pub name: String,
    pub img: Option<String>,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    #[relation(many, model = Product, references = "categoriesId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
}
