use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::{Product, User};

#[model]
#[table(name = "Review")]
pub struct Review {
    #[primary_key]
    pub id: Uuid,

    pub comment: String,
    pub rating: Option<f64>,
    pub images: Vec<String>,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    #[serde(rename = "productsId")]
    pub products_id: Option<Uuid>,

    #[serde(rename = "usersId")]
    pub users_id: Uuid,

    #[relation(one, model = User, fields = "usersId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Box<User>>,

    #[relation(one, model = Product, fields = "productsId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Box<Product>>,
}
