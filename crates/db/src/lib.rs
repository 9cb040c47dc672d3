pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    CartRepository, ConversationMessage, InMemoryCartRepository, InMemoryMessageRepository,
    InMemoryProductCacheRepository, MessageRepository, MessageRole, ProductCacheRepository,
    RepositoryError, SqlCartRepository, SqlMessageRepository, SqlProductCacheRepository,
};
