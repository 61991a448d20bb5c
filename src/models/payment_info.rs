use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::Order;

#[model]
#[table(name = "PaymentInfo")]
pub struct PaymentInfo {
    #[primary_key]
    pub id: Uuid,

    /// Defaults to `cash_on_delivery`
    #[serde(rename = "paymentMethod")]
    #[field(default)]
    pub payment_method: String,

    pub total_paid: f64,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    #[relation(many, model = Order, references = "paymentInfoId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
}
