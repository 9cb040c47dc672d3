use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use carty_core::domain::cart::{CartContents, CartLine};
use carty_core::domain::product::ProductId;

use super::{CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn get_or_create_cart_id(&self, session_id: &str) -> Result<i64, RepositoryError> {
        let existing = sqlx::query("SELECT id FROM cart WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = existing {
            let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            return Ok(id);
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO cart (session_id, created_at, updated_at) VALUES (?, ?, ?)",
        )
        .bind(session_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn touch_cart(&self, cart_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE cart SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(cart_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<CartLine, RepositoryError> {
    let product_id: i64 =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_title: String =
        row.try_get("product_title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = price_str
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("bad price `{price_str}`: {e}")))?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| RepositoryError::Decode(format!("bad quantity `{quantity}`")))?;

    Ok(CartLine { product_id: ProductId(product_id), product_title, price, quantity })
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn add_item(&self, session_id: &str, line: CartLine) -> Result<(), RepositoryError> {
        let cart_id = self.get_or_create_cart_id(session_id).await?;

        sqlx::query(
            "INSERT INTO cart_item (cart_id, product_id, product_title, price, quantity)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(cart_id, product_id) DO UPDATE SET
                 quantity = cart_item.quantity + excluded.quantity,
                 product_title = excluded.product_title,
                 price = excluded.price",
        )
        .bind(cart_id)
        .bind(line.product_id.0)
        .bind(&line.product_title)
        .bind(line.price.to_string())
        .bind(i64::from(line.quantity))
        .execute(&self.pool)
        .await?;

        self.touch_cart(cart_id).await
    }

    async fn remove_item(
        &self,
        session_id: &str,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let cart_id = self.get_or_create_cart_id(session_id).await?;

        sqlx::query("DELETE FROM cart_item WHERE cart_id = ? AND product_id = ?")
            .bind(cart_id)
            .bind(product_id.0)
            .execute(&self.pool)
            .await?;

        self.touch_cart(cart_id).await
    }

    async fn clear(&self, session_id: &str) -> Result<(), RepositoryError> {
        let cart_id = self.get_or_create_cart_id(session_id).await?;

        sqlx::query("DELETE FROM cart_item WHERE cart_id = ?")
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        self.touch_cart(cart_id).await
    }

    async fn fetch(&self, session_id: &str) -> Result<CartContents, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT ci.product_id, ci.product_title, ci.price, ci.quantity
             FROM cart_item ci
             JOIN cart c ON c.id = ci.cart_id
             WHERE c.session_id = ?
             ORDER BY ci.id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = rows.iter().map(row_to_line).collect::<Result<Vec<_>, _>>()?;
        Ok(CartContents::from_lines(lines))
    }
}
