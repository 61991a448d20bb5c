use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::{Address, Review};

#[model]
#[table(name = "User")]
pub struct User {
    #[primary_key]
    pub id: Uuid,

    pub name: String,

    #[field(unique)]
    pub email: String,

    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
    pub dob: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    #[relation(many, model = Address, references = "userId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Address>>,

    #[relation(many, model = Review, references = "usersId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}
