use bytes::Bytes;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Receipt row as stored, without the document bytes.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_name: String,
    pub product_name: String,
    #[serde(with = "iso_date")]
    pub purchase_date: Date,
    pub price: Decimal,
    pub category: String,
    pub warranty_duration: String,
    #[serde(with = "iso_date::option")]
    pub warranty_expiry_date: Option<Date>,
    pub has_document: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated receipt values for a create or update.
///
/// Built by the ledger only, so `warranty_expiry_date` always matches
/// `purchase_date` and `warranty_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptFields {
    pub store_name: String,
    pub product_name: String,
    pub purchase_date: Date,
    pub price: Decimal,
    pub category: String,
    pub warranty_duration: String,
    pub warranty_expiry_date: Option<Date>,
}

/// What an update does with the stored document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentUpdate {
    Keep,
    Replace(Bytes),
}
