use chrono::{DateTime, Utc};
use model_derive::model;
use uuid::Uuid;

use super::{DeliveryInfo, PaymentInfo, Product};

#[model]
#[table(name = "Order")]
pub struct Order {
    #[primary_key]
    pub id: Uuid,

    pub subtotal: f64,
    pub delivery_cost: f64,
    pub total: f64,

    #[field(default)]
    pub status: String,

    pub last_message: Option<String>,

    #[serde(rename = "createdAt")]
    #[field(created_at)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    #[field(updated_at)]
    pub updated_at: DateTime<Utc>,

    /// Plain column; there is no navigable `users` relation
    #[serde(rename = "usersId")]
    pub users_id: Uuid,

    #[serde(rename = "deliveryInfoId")]
    pub delivery_info_id: Option<Uuid>,

    #[serde(rename = "paymentInfoId")]
    pub payment_info_id: Option<Uuid>,

    #[relation(many, model = Product, references = "orderId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,

    #[relation(one, model = DeliveryInfo, fields = "deliveryInfoId")]
    #[serde(rename = "deliveryInfo", default, skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<Box<DeliveryInfo>>,

    #[relation(one, model = PaymentInfo, fields = "paymentInfoId")]
    #[serde(rename = "paymentInfo", default, skip_serializing_if = "Option::is_none")]
    pub payment_info: Option<Box<PaymentInfo>>,
}
