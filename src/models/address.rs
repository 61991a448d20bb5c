use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::User;

#[model]
#[table(name = "Address")]
pub struct Address {
    #[primary_key]
    pub id: Uuid,

    pub city: String,
    pub region_state: String,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    /// Owning user; addresses may be unowned
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,

    #[relation(one, model = User, fields = "userId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Box<User>>,
}
