//! Pure search filtering over an already-fetched product list.

use rust_decimal::Decimal;

use carty_core::domain::product::Product;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchFilter {
    pub query: Option<String>,
    pub category: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.category.is_none()
            && self.price_min.is_none()
            && self.price_max.is_none()
    }
}

/// Apply a search filter, preserving catalog order.
///
/// A query that names an existing category acts as a category filter rather
/// than a title/description match: "electronics" lists that category, not
/// only products with "electronics" in their copy.
pub fn filter_products(products: &[Product], filter: &SearchFilter) -> Vec<Product> {
    let query = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let query_lower = query.map(str::to_lowercase);

    let query_is_category = query_lower.as_deref().is_some_and(|q| {
        products
            .iter()
            .filter_map(|product| product.category.as_deref())
            .any(|category| category.eq_ignore_ascii_case(q))
    });

    let category = filter
        .category
        .as_deref()
        .or(if query_is_category { query } else { None })
        .map(str::to_lowercase);

    products
        .iter()
        .filter(|product| {
            if let (Some(q), false) = (query_lower.as_deref(), query_is_category) {
                let title_hit = product.title.to_lowercase().contains(q);
                let description_hit = product
                    .description
                    .as_deref()
                    .is_some_and(|description| description.to_lowercase().contains(q));
                if !title_hit && !description_hit {
                    return false;
                }
            }

            if let Some(wanted) = category.as_deref() {
                let matches = product
                    .category
                    .as_deref()
                    .is_some_and(|have| have.eq_ignore_ascii_case(wanted));
                if !matches {
                    return false;
                }
            }

            if let Some(min) = filter.price_min {
                if product.price < min {
                    return false;
                }
            }
            if let Some(max) = filter.price_max {
                if product.price > max {
                    return false;
                }
            }

            true
        })
        .cloned()
        .collect()
}
