//! Process-local store used when no database is configured, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{repo::UserStore, repo_types::User};
use crate::error::RepositoryError;
use crate::receipts::{
    repo::ReceiptStore,
    repo_types::{DocumentUpdate, Receipt, ReceiptFields},
};

struct StoredReceipt {
    receipt: Receipt,
    document: Option<Bytes>,
}

impl StoredReceipt {
    fn view(&self) -> Receipt {
        Receipt {
            has_document: self.document.is_some(),
            ..self.receipt.clone()
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    receipts: RwLock<HashMap<Uuid, StoredReceipt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn receipt_count(&self) -> usize {
        self.receipts.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == username) {
            return Err(RepositoryError::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Receipt>, RepositoryError> {
        let receipts = self.receipts.read().await;
        let mut rows: Vec<Receipt> = receipts
            .values()
            .filter(|r| r.receipt.user_id == user_id)
            .map(StoredReceipt::view)
            .collect();
        rows.sort_by(|a, b| {
            b.purchase_date
                .cmp(&a.purchase_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Receipt>, RepositoryError> {
        Ok(self.receipts.read().await.get(&id).map(StoredReceipt::view))
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Bytes>, RepositoryError> {
        let receipts = self.receipts.read().await;
        Ok(receipts.get(&id).and_then(|r| r.document.clone()))
    }

    async fn create(
        &self,
        user_id: Uuid,
        fields: &ReceiptFields,
        document: Option<Bytes>,
    ) -> Result<Receipt, RepositoryError> {
        if !self.users.read().await.contains_key(&user_id) {
            return Err(RepositoryError::MissingReference);
        }
        let now = OffsetDateTime::now_utc();
        let stored = StoredReceipt {
            receipt: Receipt {
                id: Uuid::new_v4(),
                user_id,
                store_name: fields.store_name.clone(),
                product_name: fields.product_name.clone(),
                purchase_date: fields.purchase_date,
                price: fields.price,
                category: fields.category.clone(),
                warranty_duration: fields.warranty_duration.clone(),
                warranty_expiry_date: fields.warranty_expiry_date,
                has_document: false,
                created_at: now,
                updated_at: now,
            },
            document,
        };
        let view = stored.view();
        self.receipts.write().await.insert(view.id, stored);
        Ok(view)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &ReceiptFields,
        document: DocumentUpdate,
    ) -> Result<Option<Receipt>, RepositoryError> {
        let mut receipts = self.receipts.write().await;
        let Some(stored) = receipts.get_mut(&id) else {
            return Ok(None);
        };
        let r = &mut stored.receipt;
        r.store_name = fields.store_name.clone();
        r.product_name = fields.product_name.clone();
        r.purchase_date = fields.purchase_date;
        r.price = fields.price;
        r.category = fields.category.clone();
        r.warranty_duration = fields.warranty_duration.clone();
        r.warranty_expiry_date = fields.warranty_expiry_date;
        r.updated_at = OffsetDateTime::now_utc();
        if let DocumentUpdate::Replace(bytes) = document {
            stored.document = Some(bytes);
        }
        Ok(Some(stored.view()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.receipts.write().await.remove(&id).is_some())
    }
}
