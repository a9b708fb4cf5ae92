use bytes::Bytes;

use crate::error::{AppError, AppResult};
use crate::receipts::repo_types::DocumentUpdate;

/// Receipt values exactly as submitted, before date and price parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDraft {
    pub store_name: String,
    pub product_name: String,
    pub purchase_date: String,
    pub price: String,
    pub category: String,
    pub warranty_duration: String,
}

/// Multipart receipt form as collected field by field.
#[derive(Debug, Default)]
pub struct ReceiptForm {
    store_name: Option<String>,
    product_name: Option<String>,
    purchase_date: Option<String>,
    price: Option<String>,
    category: Option<String>,
    warranty_duration: Option<String>,
    pub user_id: Option<String>,
    /// Raw `file` part, `Some` even when the part was empty.
    pub file: Option<Bytes>,
}

impl ReceiptForm {
    /// Store a text field. Returns `false` for names the form does not know.
    pub fn set_text(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "storeName" => &mut self.store_name,
            "productName" => &mut self.product_name,
            "purchaseDate" => &mut self.purchase_date,
            "price" => &mut self.price,
            "category" => &mut self.category,
            "warrantyDuration" => &mut self.warranty_duration,
            "userId" => &mut self.user_id,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn draft(&self) -> AppResult<ReceiptDraft> {
        Ok(ReceiptDraft {
            store_name: required("storeName", &self.store_name)?,
            product_name: required("productName", &self.product_name)?,
            purchase_date: required("purchaseDate", &self.purchase_date)?,
            price: required("price", &self.price)?,
            category: required("category", &self.category)?,
            warranty_duration: required("warrantyDuration", &self.warranty_duration)?,
        })
    }

    /// Document for a new receipt; an empty upload counts as none.
    pub fn new_document(&self) -> Option<Bytes> {
        self.file.clone().filter(|b| !b.is_empty())
    }

    /// Document change for an update; an empty or missing upload keeps the stored one.
    pub fn document_update(&self) -> DocumentUpdate {
        match self.new_document() {
            Some(bytes) => DocumentUpdate::Replace(bytes),
            None => DocumentUpdate::Keep,
        }
    }
}

fn required(name: &str, value: &Option<String>) -> AppResult<String> {
    value
        .clone()
        .ok_or_else(|| AppError::Validation(format!("missing field {name}")))
}
