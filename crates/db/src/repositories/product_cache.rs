use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use carty_core::domain::product::{Product, ProductId};

use super::{ProductCacheRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductCacheRepository {
    pool: DbPool,
}

impl SqlProductCacheRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let image: Option<String> =
        row.try_get("image").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = price_str
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("bad price `{price_str}`: {e}")))?;

    Ok(Product { id: ProductId(product_id), title, price, category, description, image })
}

#[async_trait::async_trait]
impl ProductCacheRepository for SqlProductCacheRepository {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT product_id, title, price, category, description, image
             FROM product_cache WHERE product_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product_cache (product_id, title, price, category, description, image, cached_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(product_id) DO UPDATE SET
                 title = excluded.title,
                 price = excluded.price,
                 category = excluded.category,
                 description = excluded.description,
                 image = excluded.image,
                 cached_at = excluded.cached_at",
        )
        .bind(product.id.0)
        .bind(&product.title)
        .bind(product.price.to_string())
        .bind(&product.category)
        .bind(&product.description)
        .bind(&product.image)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_many(&self, products: &[Product]) -> Result<(), RepositoryError> {
        for product in products {
            self.upsert(product).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use carty_core::domain::product::{Product, ProductId};

    use crate::repositories::{ProductCacheRepository, SqlProductCacheRepository};
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlProductCacheRepository {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations should apply");
        SqlProductCacheRepository::new(pool)
    }

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId(id),
            title: format!("cached-{id}"),
            price: price.parse::<Decimal>().expect("test price"),
            category: Some("electronics".to_string()),
            description: Some("cached product".to_string()),
            image: None,
        }
    }

    #[tokio::test]
    async fn upsert_round_trips_the_product() {
        let repo = repo().await;
        let original = product(101, "19.99");
        repo.upsert(&original).await.expect("upsert");

        let found = repo.find_by_id(ProductId(101)).await.expect("find");
        let found = found.expect("cached product should exist");
        assert_eq!(found, original);
        assert_eq!(found.price, original.price);
        assert_eq!(found.category.as_deref(), Some("electronics"));
    }

    #[tokio::test]
    async fn upsert_replaces_stale_rows() {
        let repo = repo().await;
        repo.upsert(&product(102, "10.00")).await.expect("first upsert");

        let mut updated = product(102, "12.00");
        updated.title = "renamed".to_string();
        repo.upsert(&updated).await.expect("second upsert");

        let found =
            repo.find_by_id(ProductId(102)).await.expect("find").expect("row should exist");
        assert_eq!(found.title, "renamed");
        assert_eq!(found.price, "12.00".parse::<Decimal>().expect("decimal"));
    }

    #[tokio::test]
    async fn missing_ids_read_as_none() {
        let repo = repo().await;
        assert!(repo.find_by_id(ProductId(40404)).await.expect("find").is_none());
    }
}
