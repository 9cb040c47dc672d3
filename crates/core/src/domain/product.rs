use std::hash::{Hash, Hasher};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Catalog-assigned product identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

/// A catalog product as fetched from the external store.
///
/// Equality and hashing go by `id` only: two fetches of the same product
/// compare equal even if the catalog updated its price in between.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Product {
    /// Prices are currency-agnostic but never negative; external catalogs
    /// are not trusted on this.
    pub fn ensure_valid(&self) -> Result<(), DomainError> {
        if self.price.is_sign_negative() {
            return Err(DomainError::NegativePrice { product_id: self.id });
        }
        Ok(())
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Product {}

impl Hash for Product {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// An order-significant sequence of products produced by one search or one
/// comparison. Insertion order is presentation order; ordinal resolution
/// depends on it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceSet(Vec<Product>);

impl ReferenceSet {
    pub fn new(products: Vec<Product>) -> Self {
        Self(products)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn products(&self) -> &[Product] {
        &self.0
    }

    pub fn into_products(self) -> Vec<Product> {
        self.0
    }

    /// 1-based position lookup.
    pub fn position(&self, rank: usize) -> Option<&Product> {
        rank.checked_sub(1).and_then(|index| self.0.get(index))
    }

    /// The first `n` products in presentation order, clamped to the set size.
    pub fn first_n(&self, n: usize) -> Vec<Product> {
        self.0.iter().take(n).cloned().collect()
    }

    /// The final `n` products, still in presentation order.
    pub fn last_n(&self, n: usize) -> Vec<Product> {
        let skip = self.0.len().saturating_sub(n);
        self.0.iter().skip(skip).cloned().collect()
    }

    /// Lowest-priced product; ties go to the earliest position.
    pub fn cheapest(&self) -> Option<&Product> {
        self.0.iter().min_by(|a, b| a.price.cmp(&b.price))
    }

    /// Highest-priced product; ties go to the earliest position.
    ///
    /// `Iterator::max_by` keeps the last of equal elements, so the scan is
    /// written out with a strict comparison instead.
    pub fn most_expensive(&self) -> Option<&Product> {
        self.0.iter().fold(None, |best: Option<&Product>, candidate| match best {
            Some(current) if candidate.price > current.price => Some(candidate),
            Some(current) => Some(current),
            None => Some(candidate),
        })
    }
}

impl From<Vec<Product>> for ReferenceSet {
    fn from(products: Vec<Product>) -> Self {
        Self(products)
    }
}

impl FromIterator<Product> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = Product>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Product, ProductId, ReferenceSet};

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId(id),
            title: format!("product-{id}"),
            price: price.parse::<Decimal>().expect("test price"),
            category: None,
            description: None,
            image: None,
        }
    }

    #[test]
    fn equality_is_by_identifier_only() {
        let mut a = product(7, "19.99");
        let b = product(7, "24.99");
        a.title = "renamed".to_string();
        assert_eq!(a, b);
        assert_ne!(product(7, "19.99"), product(8, "19.99"));
    }

    #[test]
    fn position_is_one_based() {
        let set = ReferenceSet::new(vec![product(1, "5"), product(2, "6")]);
        assert_eq!(set.position(1).map(|p| p.id), Some(ProductId(1)));
        assert_eq!(set.position(2).map(|p| p.id), Some(ProductId(2)));
        assert!(set.position(0).is_none());
        assert!(set.position(3).is_none());
    }

    #[test]
    fn first_n_clamps_to_set_size() {
        let set = ReferenceSet::new(vec![product(1, "5")]);
        assert_eq!(set.first_n(2).len(), 1);
    }

    #[test]
    fn last_n_keeps_presentation_order() {
        let set = ReferenceSet::new(vec![product(1, "5"), product(2, "6"), product(3, "7")]);
        let tail: Vec<i64> = set.last_n(2).iter().map(|p| p.id.0).collect();
        assert_eq!(tail, vec![2, 3]);
    }

    #[test]
    fn price_selectors_break_ties_by_earliest_position() {
        let set = ReferenceSet::new(vec![product(1, "9.99"), product(2, "9.99")]);
        assert_eq!(set.cheapest().map(|p| p.id), Some(ProductId(1)));
        assert_eq!(set.most_expensive().map(|p| p.id), Some(ProductId(1)));

        let mixed = ReferenceSet::new(vec![product(1, "3"), product(2, "8"), product(3, "8")]);
        assert_eq!(mixed.cheapest().map(|p| p.id), Some(ProductId(1)));
        assert_eq!(mixed.most_expensive().map(|p| p.id), Some(ProductId(2)));
    }

    #[test]
    fn negative_prices_are_rejected() {
        let good = product(1, "0");
        assert!(good.ensure_valid().is_ok());
        let bad = product(2, "-1.50");
        assert!(bad.ensure_valid().is_err());
    }

    #[test]
    fn empty_set_has_no_selections() {
        let set = ReferenceSet::default();
        assert!(set.cheapest().is_none());
        assert!(set.most_expensive().is_none());
        assert!(set.first_n(3).is_empty());
    }
}
