use bytes::Bytes;
use rust_decimal::Decimal;
use time::{macros::format_description, Date};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::receipts::{
    dto::ReceiptDraft,
    repo::ReceiptStore,
    repo_types::{DocumentUpdate, Receipt, ReceiptFields},
};
use crate::warranty::{calculate_expiry, offset_months};

/// ISO calendar date, e.g. `2024-03-15`.
pub fn parse_purchase_date(raw: &str) -> AppResult<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::Validation(format!("invalid purchaseDate: {raw:?}")))
}

/// Exact decimal price. Values that would need rounding to fit are rejected.
pub fn parse_price(raw: &str) -> AppResult<Decimal> {
    Decimal::from_str_exact(raw.trim())
        .map_err(|e| AppError::Validation(format!("invalid price {raw:?}: {e}")))
}

/// Parse a draft and derive its warranty expiry.
pub fn parse_draft(draft: &ReceiptDraft) -> AppResult<ReceiptFields> {
    let purchase_date = parse_purchase_date(&draft.purchase_date)?;
    let price = parse_price(&draft.price)?;
    let warranty_expiry_date = calculate_expiry(Some(purchase_date), &draft.warranty_duration);
    if warranty_expiry_date.is_none() {
        if offset_months(&draft.warranty_duration).is_some() {
            warn!(%purchase_date, warranty_duration = %draft.warranty_duration, "expiry beyond supported calendar range");
        } else {
            debug!(warranty_duration = %draft.warranty_duration, "no expiry for duration label");
        }
    }
    Ok(ReceiptFields {
        store_name: draft.store_name.clone(),
        product_name: draft.product_name.clone(),
        purchase_date,
        price,
        category: draft.category.clone(),
        warranty_duration: draft.warranty_duration.clone(),
        warranty_expiry_date,
    })
}

#[instrument(skip(receipts))]
pub async fn list_by_user(receipts: &dyn ReceiptStore, user_id: Uuid) -> AppResult<Vec<Receipt>> {
    let rows = receipts.list_by_owner(user_id).await?;
    debug!(count = rows.len(), "receipts listed");
    Ok(rows)
}

#[instrument(skip(receipts))]
pub async fn get(receipts: &dyn ReceiptStore, id: Uuid) -> AppResult<Receipt> {
    receipts.find_by_id(id).await?.ok_or_else(receipt_not_found)
}

#[instrument(skip(receipts))]
pub async fn document(receipts: &dyn ReceiptStore, id: Uuid) -> AppResult<Bytes> {
    if receipts.find_by_id(id).await?.is_none() {
        return Err(receipt_not_found());
    }
    receipts
        .find_document(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Receipt has no document".into()))
}

#[instrument(skip(users, receipts, draft, document))]
pub async fn create(
    users: &dyn UserStore,
    receipts: &dyn ReceiptStore,
    user_id: Uuid,
    draft: &ReceiptDraft,
    document: Option<Bytes>,
) -> AppResult<Receipt> {
    if users.find_by_id(user_id).await?.is_none() {
        warn!("receipt for unknown user");
        return Err(user_not_found());
    }
    let fields = parse_draft(draft)?;
    let document = document.filter(|b| !b.is_empty());

    // The owner may vanish between the lookup and the insert.
    let receipt = receipts
        .create(user_id, &fields, document)
        .await
        .map_err(|e| match e {
            RepositoryError::MissingReference => user_not_found(),
            other => other.into(),
        })?;

    info!(receipt_id = %receipt.id, has_document = receipt.has_document, "receipt created");
    Ok(receipt)
}

#[instrument(skip(receipts, draft, document))]
pub async fn update(
    receipts: &dyn ReceiptStore,
    id: Uuid,
    draft: &ReceiptDraft,
    document: DocumentUpdate,
) -> AppResult<Receipt> {
    if receipts.find_by_id(id).await?.is_none() {
        warn!("update of unknown receipt");
        return Err(receipt_not_found());
    }
    let fields = parse_draft(draft)?;
    let document = match document {
        DocumentUpdate::Replace(bytes) if bytes.is_empty() => DocumentUpdate::Keep,
        other => other,
    };
    let replaced = matches!(document, DocumentUpdate::Replace(_));

    let receipt = receipts
        .update(id, &fields, document)
        .await?
        .ok_or_else(receipt_not_found)?;

    info!(receipt_id = %receipt.id, document_replaced = replaced, "receipt updated");
    Ok(receipt)
}

/// Idempotent; no ownership check.
#[instrument(skip(receipts))]
pub async fn delete(receipts: &dyn ReceiptStore, id: Uuid) -> AppResult<()> {
    let removed = receipts.delete(id).await?;
    info!(removed, "receipt delete");
    Ok(())
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

fn receipt_not_found() -> AppError {
    AppError::NotFound("Receipt not found".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use time::macros::date;

    fn draft(purchase_date: &str, warranty: &str) -> ReceiptDraft {
        ReceiptDraft {
            store_name: "Elkjøp".into(),
            product_name: "Dishwasher".into(),
            purchase_date: purchase_date.into(),
            price: "4999.90".into(),
            category: "Appliances".into(),
            warranty_duration: warranty.into(),
        }
    }

    async fn store_with_user() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, "owner", "hash").await.unwrap();
        (store, user.id)
    }

    #[test]
    fn draft_parsing_derives_expiry() {
        let fields = parse_draft(&draft("2024-01-31", "1 year")).unwrap();
        assert_eq!(fields.purchase_date, date!(2024 - 01 - 31));
        assert_eq!(fields.warranty_expiry_date, Some(date!(2025 - 01 - 31)));
        assert_eq!(fields.price, Decimal::new(499990, 2));

        let lifetime = parse_draft(&draft("2024-01-31", "lifetime")).unwrap();
        assert_eq!(lifetime.warranty_expiry_date, Some(date!(2123 - 01 - 31)));

        let other = parse_draft(&draft("2024-01-31", "other")).unwrap();
        assert_eq!(other.warranty_expiry_date, None);
    }

    #[test]
    fn malformed_dates_are_validation_errors() {
        for raw in ["", "15/03/2024", "2024-13-01", "2024-02-30", "2024-3-15", " 2024-03-15"] {
            assert!(
                matches!(parse_purchase_date(raw), Err(AppError::Validation(_))),
                "date {raw:?}"
            );
        }
    }

    #[test]
    fn prices_keep_cents_exactly() {
        assert_eq!(parse_price("0.10").unwrap() + parse_price("0.20").unwrap(), parse_price("0.30").unwrap());
        assert_eq!(parse_price("19.99").unwrap().to_string(), "19.99");
        assert_eq!(parse_price(" 5 ").unwrap(), Decimal::new(5, 0));
        assert!(matches!(parse_price("12,50"), Err(AppError::Validation(_))));
        assert!(matches!(parse_price("abc"), Err(AppError::Validation(_))));
    }

    #[test]
    fn prices_needing_rounding_are_rejected() {
        for raw in ["0.123456789012345678901234567891", "123456789012345678901234567890.00"] {
            assert!(
                matches!(parse_price(raw), Err(AppError::Validation(_))),
                "price {raw:?}"
            );
        }
        let precise = parse_price("0.1234567890123456789012345678").unwrap();
        assert_eq!(precise.to_string(), "0.1234567890123456789012345678");
    }

    #[tokio::test]
    async fn create_for_unknown_user_persists_nothing() {
        let (store, _) = store_with_user().await;
        let ghost = Uuid::new_v4();
        let err = create(&store, &store, ghost, &draft("2024-03-15", "1 year"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(list_by_user(&store, ghost).await.unwrap().is_empty());
        assert_eq!(store.receipt_count().await, 0);
    }

    #[tokio::test]
    async fn failed_update_leaves_record_untouched() {
        let (store, user_id) = store_with_user().await;
        let receipt = create(
            &store,
            &store,
            user_id,
            &draft("2024-03-15", "2 years"),
            Some(Bytes::from_static(b"scan")),
        )
        .await
        .unwrap();

        let err = update(
            &store,
            receipt.id,
            &draft("15.03.2025", "lifetime"),
            DocumentUpdate::Replace(Bytes::from_static(b"other scan")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut bad_price = draft("2025-03-15", "lifetime");
        bad_price.price = "free".into();
        let err = update(&store, receipt.id, &bad_price, DocumentUpdate::Keep)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let stored = get(&store, receipt.id).await.unwrap();
        assert_eq!(stored.purchase_date, receipt.purchase_date);
        assert_eq!(stored.warranty_duration, "2 years");
        assert_eq!(stored.warranty_expiry_date, Some(date!(2026 - 03 - 15)));
        assert_eq!(stored.price, receipt.price);
        assert_eq!(stored.updated_at, receipt.updated_at);
        assert_eq!(document(&store, receipt.id).await.unwrap(), "scan");
    }

    #[tokio::test]
    async fn create_stores_expiry_and_document() {
        let (store, user_id) = store_with_user().await;
        let receipt = create(
            &store,
            &store,
            user_id,
            &draft("2024-01-31", "6 Months"),
            Some(Bytes::from_static(b"%PDF-1.7")),
        )
        .await
        .unwrap();

        assert_eq!(receipt.user_id, user_id);
        assert_eq!(receipt.warranty_expiry_date, Some(date!(2024 - 07 - 31)));
        assert!(receipt.has_document);
        assert_eq!(document(&store, receipt.id).await.unwrap(), "%PDF-1.7");

        let listed = list_by_user(&store, user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, receipt.id);
    }

    #[tokio::test]
    async fn create_ignores_empty_document() {
        let (store, user_id) = store_with_user().await;
        let receipt = create(&store, &store, user_id, &draft("2024-03-15", "1 year"), Some(Bytes::new()))
            .await
            .unwrap();
        assert!(!receipt.has_document);
        assert!(matches!(document(&store, receipt.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_with_bad_date_is_validation_error() {
        let (store, user_id) = store_with_user().await;
        let err = create(&store, &store, user_id, &draft("March 15", "1 year"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(list_by_user(&store, user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_without_document_keeps_previous_bytes() {
        let (store, user_id) = store_with_user().await;
        let original = Bytes::from_static(b"\x00\x01original scan\xff");
        let receipt = create(&store, &store, user_id, &draft("2024-03-15", "1 year"), Some(original.clone()))
            .await
            .unwrap();

        let updated = update(&store, receipt.id, &draft("2023-06-01", "2 years"), DocumentUpdate::Keep)
            .await
            .unwrap();
        assert_eq!(updated.purchase_date, date!(2023 - 06 - 01));
        assert_eq!(updated.warranty_expiry_date, Some(date!(2025 - 06 - 01)));
        assert_eq!(updated.user_id, user_id);
        assert_eq!(document(&store, receipt.id).await.unwrap(), original);

        update(
            &store,
            receipt.id,
            &draft("2023-06-01", "2 years"),
            DocumentUpdate::Replace(Bytes::new()),
        )
        .await
        .unwrap();
        assert_eq!(document(&store, receipt.id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn update_with_document_replaces_it() {
        let (store, user_id) = store_with_user().await;
        let receipt = create(
            &store,
            &store,
            user_id,
            &draft("2024-03-15", "1 year"),
            Some(Bytes::from_static(b"old")),
        )
        .await
        .unwrap();

        update(
            &store,
            receipt.id,
            &draft("2024-03-15", "1 year"),
            DocumentUpdate::Replace(Bytes::from_static(b"new")),
        )
        .await
        .unwrap();
        assert_eq!(document(&store, receipt.id).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn update_to_unknown_label_clears_expiry() {
        let (store, user_id) = store_with_user().await;
        let receipt = create(&store, &store, user_id, &draft("2024-03-15", "5 years"), None)
            .await
            .unwrap();
        assert!(receipt.warranty_expiry_date.is_some());

        let updated = update(&store, receipt.id, &draft("2024-03-15", "Other"), DocumentUpdate::Keep)
            .await
            .unwrap();
        assert_eq!(updated.warranty_expiry_date, None);
    }

    #[tokio::test]
    async fn update_unknown_receipt_is_not_found() {
        let (store, _) = store_with_user().await;
        let err = update(&store, Uuid::new_v4(), &draft("2024-03-15", "1 year"), DocumentUpdate::Keep)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (store, user_id) = store_with_user().await;
        let receipt = create(&store, &store, user_id, &draft("2024-03-15", "1 year"), None)
            .await
            .unwrap();

        delete(&store, receipt.id).await.unwrap();
        delete(&store, receipt.id).await.unwrap();
        delete(&store, Uuid::new_v4()).await.unwrap();
        assert!(matches!(get(&store, receipt.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_unknown_user_is_empty() {
        let (store, _) = store_with_user().await;
        assert!(list_by_user(&store, Uuid::new_v4()).await.unwrap().is_empty());
    }
}
