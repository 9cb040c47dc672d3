use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use carty_core::domain::cart::{CartContents, CartLine};
use carty_core::domain::product::{Product, ProductId};

pub mod cart;
pub mod memory;
pub mod message;
pub mod product_cache;

pub use cart::SqlCartRepository;
pub use memory::{InMemoryCartRepository, InMemoryMessageRepository, InMemoryProductCacheRepository};
pub use message::SqlMessageRepository;
pub use product_cache::SqlProductCacheRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One row of a session's transcript. `content` is either plain text (user
/// turns) or canonical envelope JSON (assistant turns).
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationMessage {
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Add a line to the session's cart; re-adding a product accumulates its
    /// quantity instead of inserting a second line.
    async fn add_item(&self, session_id: &str, line: CartLine) -> Result<(), RepositoryError>;

    async fn remove_item(
        &self,
        session_id: &str,
        product_id: ProductId,
    ) -> Result<(), RepositoryError>;

    async fn clear(&self, session_id: &str) -> Result<(), RepositoryError>;

    async fn fetch(&self, session_id: &str) -> Result<CartContents, RepositoryError>;
}

#[async_trait]
pub trait ProductCacheRepository: Send + Sync {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn upsert(&self, product: &Product) -> Result<(), RepositoryError>;

    async fn upsert_many(&self, products: &[Product]) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError>;

    async fn list_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, RepositoryError>;
}
