use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::ProductId;
use crate::errors::DomainError;

/// One line of a session's cart. The title and price are denormalized at
/// add time so the cart stays renderable even if the catalog entry changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_title: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub fn ensure_valid(&self) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::ZeroQuantity { product_id: self.product_id });
        }
        if self.price.is_sign_negative() {
            return Err(DomainError::NegativePrice { product_id: self.product_id });
        }
        Ok(())
    }
}

/// A session's cart with totals computed from its lines.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartContents {
    pub items: Vec<CartLine>,
    pub total_items: u64,
    pub total_price: Decimal,
}

impl CartContents {
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let total_items = items.iter().map(|line| u64::from(line.quantity)).sum();
        let total_price = items.iter().map(CartLine::line_total).sum();
        Self { items, total_items, total_price }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CartContents, CartLine};
    use crate::domain::product::ProductId;

    fn line(id: i64, price: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId(id),
            product_title: format!("item-{id}"),
            price: price.parse::<Decimal>().expect("test price"),
            quantity,
        }
    }

    #[test]
    fn totals_account_for_quantities() {
        let cart = CartContents::from_lines(vec![line(1, "10.50", 2), line(2, "3.25", 1)]);
        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.total_price, "24.25".parse::<Decimal>().expect("total"));
    }

    #[test]
    fn zero_quantity_lines_are_rejected() {
        assert!(line(1, "4.00", 1).ensure_valid().is_ok());
        assert!(line(1, "4.00", 0).ensure_valid().is_err());
    }

    #[test]
    fn empty_cart_has_zero_totals() {
        let cart = CartContents::from_lines(Vec::new());
        assert!(cart.is_empty());
        assert_eq!(cart.total_items, 0);
        assert_eq!(cart.total_price, Decimal::ZERO);
    }
}
