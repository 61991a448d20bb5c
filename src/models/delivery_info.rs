use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::Order;

#[model]
#[table(name = "DeliveryInfo")]
pub struct DeliveryInfo {
    #[primary_key]
    pub id: Uuid,

    pub name: String,
    pub phone: String,

    #[serde(rename = "secondPhone")]
    pub second_phone: Option<String>,

    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub full_address: Option<String>,
    pub method: Option<String>,
    pub messages: Vec<String>,

    #[serde(rename = "expectedDate")]
    pub expected_date: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    #[relation(many, model = Order, references = "deliveryInfoId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
}
