use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use carty_core::domain::cart::{CartContents, CartLine};
use carty_core::domain::product::{Product, ProductId};

use super::{
    CartRepository, ConversationMessage, MessageRepository, MessageRole, ProductCacheRepository,
    RepositoryError,
};

#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Vec<CartLine>>>,
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn add_item(&self, session_id: &str, line: CartLine) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        let items = carts.entry(session_id.to_string()).or_default();
        if let Some(existing) = items.iter_mut().find(|item| item.product_id == line.product_id) {
            existing.quantity += line.quantity;
            existing.product_title = line.product_title;
            existing.price = line.price;
        } else {
            items.push(line);
        }
        Ok(())
    }

    async fn remove_item(
        &self,
        session_id: &str,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        if let Some(items) = carts.get_mut(session_id) {
            items.retain(|item| item.product_id != product_id);
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        carts.remove(session_id);
        Ok(())
    }

    async fn fetch(&self, session_id: &str) -> Result<CartContents, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(CartContents::from_lines(carts.get(session_id).cloned().unwrap_or_default()))
    }
}

#[derive(Default)]
pub struct InMemoryProductCacheRepository {
    products: RwLock<HashMap<i64, Product>>,
}

#[async_trait::async_trait]
impl ProductCacheRepository for InMemoryProductCacheRepository {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0, product.clone());
        Ok(())
    }

    async fn upsert_many(&self, batch: &[Product]) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        for product in batch {
            products.insert(product.id.0, product.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<ConversationMessage>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.push(ConversationMessage {
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|m| m.session_id == session_id).cloned().collect())
    }
}
