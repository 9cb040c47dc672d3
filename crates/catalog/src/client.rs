use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use carty_core::domain::product::{Product, ProductId};
use carty_core::errors::DomainError;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {status} for {path}")]
    Status { status: u16, path: String },
    #[error("product {0} not found in catalog")]
    NotFound(i64),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Read-only catalog seam. The HTTP client implements it for production;
/// tests swap in [`InMemoryCatalog`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Product>, CatalogError>;
    async fn fetch_product(&self, id: ProductId) -> Result<Product, CatalogError>;
    async fn fetch_category(&self, category: &str) -> Result<Vec<Product>, CatalogError>;
    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError>;
}

/// Wire shape of one Fake Store API product. Prices arrive as JSON floats;
/// `Decimal` takes them directly.
#[derive(Debug, Deserialize)]
struct ApiProduct {
    id: i64,
    title: String,
    price: Decimal,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

impl ApiProduct {
    fn into_domain(self) -> Result<Product, CatalogError> {
        let product = Product {
            id: ProductId(self.id),
            title: self.title,
            price: self.price,
            category: self.category,
            description: self.description,
            image: self.image,
        };
        product.ensure_valid()?;
        Ok(product)
    }
}

pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl StoreClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs.max(1)))
            .build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, CatalogError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status { status: status.as_u16(), path: path.to_string() });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogSource for StoreClient {
    async fn fetch_all(&self) -> Result<Vec<Product>, CatalogError> {
        let products: Vec<ApiProduct> = self.get_json("/products").await?;
        products.into_iter().map(ApiProduct::into_domain).collect()
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        // The upstream API answers a missing id with an empty/null body
        // rather than a 404.
        let path = format!("/products/{}", id.0);
        let product: Option<ApiProduct> = self.get_json(&path).await?;
        product.ok_or(CatalogError::NotFound(id.0))?.into_domain()
    }

    async fn fetch_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        let path = format!("/products/category/{category}");
        let products: Vec<ApiProduct> = self.get_json(&path).await?;
        products.into_iter().map(ApiProduct::into_domain).collect()
    }

    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        self.get_json("/products/categories").await
    }
}

/// Catalog backed by a fixed product list. Lookup order mirrors the wire
/// client: ids resolve exactly, categories compare case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    products: Vec<Product>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn fetch_all(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.clone())
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.products
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or(CatalogError::NotFound(id.0))
    }

    async fn fetch_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .products
            .iter()
            .filter(|product| {
                product
                    .category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            })
            .cloned()
            .collect())
    }

    async fn fetch_categories(&self) -> Result<Vec<String>, CatalogError> {
        let mut categories: Vec<String> =
            self.products.iter().filter_map(|product| product.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }
}
