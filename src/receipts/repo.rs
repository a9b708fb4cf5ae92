use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::receipts::repo_types::{DocumentUpdate, Receipt, ReceiptFields};

/// Persistence for receipts. Owners are referenced by foreign key.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Receipt>, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Receipt>, RepositoryError>;

    /// Document bytes, `None` if the receipt or its document is absent.
    async fn find_document(&self, id: Uuid) -> Result<Option<Bytes>, RepositoryError>;

    /// Unknown owner yields `RepositoryError::MissingReference`.
    async fn create(
        &self,
        user_id: Uuid,
        fields: &ReceiptFields,
        document: Option<Bytes>,
    ) -> Result<Receipt, RepositoryError>;

    /// `Ok(None)` when no receipt has this id. The owner is never changed.
    async fn update(
        &self,
        id: Uuid,
        fields: &ReceiptFields,
        document: DocumentUpdate,
    ) -> Result<Option<Receipt>, RepositoryError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

const RECEIPT_COLUMNS: &str = "id, user_id, store_name, product_name, purchase_date, price, \
     category, warranty_duration, warranty_expiry_date, \
     pdf_data IS NOT NULL AS has_document, created_at, updated_at";

#[derive(Clone)]
pub struct PgReceiptStore {
    db: PgPool,
}

impl PgReceiptStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReceiptStore for PgReceiptStore {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Receipt>, RepositoryError> {
        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts \
             WHERE user_id = $1 \
             ORDER BY purchase_date DESC, created_at DESC"
        );
        let rows = sqlx::query_as::<_, Receipt>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Receipt>, RepositoryError> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = $1");
        let row = sqlx::query_as::<_, Receipt>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Bytes>, RepositoryError> {
        let row: Option<(Option<Vec<u8>>,)> =
            sqlx::query_as(r#"SELECT pdf_data FROM receipts WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.and_then(|(data,)| data).map(Bytes::from))
    }

    async fn create(
        &self,
        user_id: Uuid,
        fields: &ReceiptFields,
        document: Option<Bytes>,
    ) -> Result<Receipt, RepositoryError> {
        let sql = format!(
            "INSERT INTO receipts (id, user_id, store_name, product_name, purchase_date, price, \
                                   category, warranty_duration, warranty_expiry_date, pdf_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {RECEIPT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Receipt>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&fields.store_name)
            .bind(&fields.product_name)
            .bind(fields.purchase_date)
            .bind(fields.price)
            .bind(&fields.category)
            .bind(&fields.warranty_duration)
            .bind(fields.warranty_expiry_date)
            .bind(document.as_deref())
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ReceiptFields,
        document: DocumentUpdate,
    ) -> Result<Option<Receipt>, RepositoryError> {
        let replacement = match &document {
            DocumentUpdate::Keep => None,
            DocumentUpdate::Replace(bytes) => Some(bytes.as_ref()),
        };
        // NULL keeps the stored document
        let sql = format!(
            "UPDATE receipts \
                SET store_name = $2, product_name = $3, purchase_date = $4, price = $5, \
                    category = $6, warranty_duration = $7, warranty_expiry_date = $8, \
                    pdf_data = COALESCE($9, pdf_data), updated_at = now() \
              WHERE id = $1 \
             RETURNING {RECEIPT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Receipt>(&sql)
            .bind(id)
            .bind(&fields.store_name)
            .bind(&fields.product_name)
            .bind(fields.purchase_date)
            .bind(fields.price)
            .bind(&fields.category)
            .bind(&fields.warranty_duration)
            .bind(fields.warranty_expiry_date)
            .bind(replacement)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let res = sqlx::query(r#"DELETE FROM receipts WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
