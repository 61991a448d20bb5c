use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

#[model]
#[table(name = "Admin")]
pub struct Admin {
    #[primary_key]
    pub id: Uuid,

    pub name: String,
    pub phone: String,
    pub password: String,

    /// Defaults to `admin`
    #[field(default)]
    pub role: String,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,
}
