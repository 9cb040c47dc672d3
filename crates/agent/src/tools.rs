use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use carty_catalog::client::{CatalogError, CatalogSource};
use carty_catalog::search::{filter_products, SearchFilter};
use carty_core::domain::cart::CartLine;
use carty_core::domain::product::{Product, ProductId, ReferenceSet};
use carty_core::reference::resolver::{resolve_many, resolve_single};
use carty_core::reference::store::{ReferenceSnapshot, ReferenceStore};
use carty_db::repositories::{CartRepository, ProductCacheRepository};

/// Everything a tool needs for one turn. Passed explicitly; there is no
/// ambient session state, so a tool invocation is fully described by its
/// context and input.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub references: Arc<Mutex<ReferenceStore>>,
    pub catalog: Arc<dyn CatalogSource>,
    pub carts: Arc<dyn CartRepository>,
    pub product_cache: Arc<dyn ProductCacheRepository>,
}

impl ToolContext {
    /// Owned snapshot of the session's reference memory; resolution works on
    /// this, never on the live store.
    pub async fn snapshot(&self) -> ReferenceSnapshot {
        self.references.lock().await.snapshot(&self.session_id)
    }

    async fn record_search(&self, results: ReferenceSet) {
        self.references.lock().await.record_search(&self.session_id, results);
    }

    async fn record_comparison(&self, products: ReferenceSet) {
        self.references.lock().await.record_comparison(&self.session_id, products);
    }

    /// Cache-or-fetch lookup. A product the catalog does not know is `None`;
    /// transport failures propagate.
    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>> {
        if let Some(product) = self.product_cache.find_by_id(id).await? {
            return Ok(Some(product));
        }

        match self.catalog.fetch_product(id).await {
            Ok(product) => {
                self.product_cache.upsert(&product).await?;
                Ok(Some(product))
            }
            Err(CatalogError::NotFound(_)) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

/// One operation the model may invoke. User-level problems (unresolvable
/// reference, unknown product) come back as `{"error": ...}` values the
/// model can read and repair; only infrastructure failures are `Err`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Registry with the full shopping tool set.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::default();
        registry.register(SearchProducts);
        registry.register(GetProductDetails);
        registry.register(AddToCart);
        registry.register(RemoveFromCart);
        registry.register(GetCart);
        registry.register(CompareProducts);
        registry.register(ClearCart);
        registry
    }

    pub async fn execute(&self, name: &str, ctx: &ToolContext, input: Value) -> Result<Value> {
        let tool =
            self.tools.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(ctx, input).await
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn error_value(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

fn product_summary(product: &Product) -> Value {
    json!({
        "id": product.id,
        "title": product.title,
        "price": product.price,
        "category": product.category,
        "image": product.image,
    })
}

/// How many results a search hands to the model and remembers for
/// reference resolution.
const SEARCH_RESULT_LIMIT: usize = 5;

pub struct SearchProducts;

#[derive(Debug, Default, Deserialize)]
struct SearchInput {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    price_range: Option<Value>,
}

fn parse_price_range(raw: &Value) -> Result<(Option<Decimal>, Option<Decimal>), String> {
    #[derive(Debug, Default, Deserialize)]
    struct PriceRange {
        #[serde(default)]
        min: Option<Decimal>,
        #[serde(default)]
        max: Option<Decimal>,
    }

    let parsed: Result<PriceRange, _> = match raw {
        // Some models pass the range as a JSON-encoded string.
        Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    };

    parsed
        .map(|range| (range.min, range.max))
        .map_err(|_| r#"Invalid price_range format. Use JSON: {"min": X, "max": Y}"#.to_string())
}

#[async_trait]
impl Tool for SearchProducts {
    fn name(&self) -> &'static str {
        "search_products"
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value> {
        let input: SearchInput = serde_json::from_value(input)?;

        let (price_min, price_max) = match &input.price_range {
            Some(raw) if !raw.is_null() => match parse_price_range(raw) {
                Ok(bounds) => bounds,
                Err(message) => return Ok(error_value(message)),
            },
            _ => (None, None),
        };

        let filter = SearchFilter {
            query: input.query,
            category: input.category,
            price_min,
            price_max,
        };

        let all = ctx.catalog.fetch_all().await?;
        let matches = filter_products(&all, &filter);
        ctx.product_cache.upsert_many(&matches).await?;

        let top: Vec<Product> = matches.into_iter().take(SEARCH_RESULT_LIMIT).collect();
        let listing: Vec<Value> = top.iter().map(product_summary).collect();

        // Remember the presented set only after the search fully succeeded.
        ctx.record_search(ReferenceSet::new(top)).await;

        Ok(Value::Array(listing))
    }
}

pub struct GetProductDetails;

#[derive(Debug, Deserialize)]
struct ProductIdInput {
    product_id: i64,
}

#[async_trait]
impl Tool for GetProductDetails {
    fn name(&self) -> &'static str {
        "get_product_details"
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value> {
        let input: ProductIdInput = serde_json::from_value(input)?;
        let id = ProductId(input.product_id);

        match ctx.product_by_id(id).await? {
            Some(product) => Ok(serde_json::to_value(&product)?),
            None => Ok(error_value(format!("Product {} not found", input.product_id))),
        }
    }
}

pub struct AddToCart;

#[derive(Debug, Default, Deserialize)]
struct AddToCartInput {
    #[serde(default)]
    product_id: Option<i64>,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    reference: Option<String>,
}

#[async_trait]
impl Tool for AddToCart {
    fn name(&self) -> &'static str {
        "add_to_cart"
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value> {
        let input: AddToCartInput = serde_json::from_value(input)?;
        let quantity = input.quantity.unwrap_or(1);

        let product_id = match (input.product_id, input.reference.as_deref()) {
            (Some(id), _) => Some(ProductId(id)),
            (None, Some(reference)) => {
                let snapshot = ctx.snapshot().await;
                match resolve_single(reference, &snapshot) {
                    Some(product) => Some(product.id),
                    None => {
                        return Ok(error_value(format!(
                            "Could not resolve reference '{reference}'. Please search for \
                             products first or specify a product ID."
                        )))
                    }
                }
            }
            (None, None) => None,
        };

        let Some(product_id) = product_id else {
            return Ok(error_value("Product ID or reference required"));
        };

        let Some(product) = ctx.product_by_id(product_id).await? else {
            return Ok(error_value(format!("Product {} not found", product_id.0)));
        };

        let line = CartLine {
            product_id: product.id,
            product_title: product.title.clone(),
            price: product.price,
            quantity,
        };
        if let Err(violation) = line.ensure_valid() {
            return Ok(error_value(violation.to_string()));
        }

        ctx.carts.add_item(&ctx.session_id, line).await?;

        Ok(json!({
            "success": true,
            "message": format!("Added {quantity} of '{}' to cart", product.title),
            "product_id": product.id,
            "quantity": quantity,
        }))
    }
}

pub struct RemoveFromCart;

#[async_trait]
impl Tool for RemoveFromCart {
    fn name(&self) -> &'static str {
        "remove_from_cart"
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value> {
        let input: ProductIdInput = serde_json::from_value(input)?;
        ctx.carts.remove_item(&ctx.session_id, ProductId(input.product_id)).await?;

        Ok(json!({
            "success": true,
            "message": format!("Removed product {} from cart", input.product_id),
            "product_id": input.product_id,
        }))
    }
}

pub struct GetCart;

#[async_trait]
impl Tool for GetCart {
    fn name(&self) -> &'static str {
        "get_cart"
    }

    async fn execute(&self, ctx: &ToolContext, _input: Value) -> Result<Value> {
        let cart = ctx.carts.fetch(&ctx.session_id).await?;
        let mut value = serde_json::to_value(&cart)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("session_id".to_string(), json!(ctx.session_id));
        }
        Ok(value)
    }
}

pub struct CompareProducts;

#[derive(Debug, Default, Deserialize)]
struct CompareInput {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    product_ids: Option<Value>,
}

fn parse_product_ids(raw: &Value) -> Result<Vec<i64>, String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_i64().ok_or_else(|| "product_ids must be integers".to_string())
            })
            .collect(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|_| format!("`{part}` is not a valid product id"))
            })
            .collect(),
        _ => Err("product_ids must be a list or comma-separated string".to_string()),
    }
}

#[async_trait]
impl Tool for CompareProducts {
    fn name(&self) -> &'static str {
        "compare_products"
    }

    async fn execute(&self, ctx: &ToolContext, input: Value) -> Result<Value> {
        let input: CompareInput = serde_json::from_value(input)?;

        let products: Vec<Product> = if let Some(reference) = input.reference.as_deref() {
            let snapshot = ctx.snapshot().await;
            match resolve_many(reference, &snapshot) {
                Some(products) => products,
                None => {
                    return Ok(error_value(format!(
                        "Could not resolve reference '{reference}'. Try 'first two' or \
                         'top three' after searching."
                    )))
                }
            }
        } else if let Some(raw_ids) = input.product_ids.as_ref().filter(|raw| !raw.is_null()) {
            let ids = match parse_product_ids(raw_ids) {
                Ok(ids) => ids,
                Err(message) => return Ok(error_value(message)),
            };
            let mut found = Vec::new();
            for id in ids {
                // Unknown ids are skipped, not fatal: compare what exists.
                if let Some(product) = ctx.product_by_id(ProductId(id)).await? {
                    found.push(product);
                }
            }
            found
        } else {
            Vec::new()
        };

        if products.is_empty() {
            return Ok(error_value("No products to compare. Search for products first."));
        }

        let set = ReferenceSet::new(products.clone());
        let mut comparison = json!({
            "products": products.iter().map(product_summary).collect::<Vec<_>>(),
            "count": products.len(),
            "text": format!("Comparing {} products:", products.len()),
        });

        if products.len() >= 2 {
            // Selectors come from the set so tie-breaking matches resolution.
            if let (Some(cheapest), Some(most_expensive)) =
                (set.cheapest(), set.most_expensive())
            {
                let price_difference = (most_expensive.price - cheapest.price).round_dp(2);
                comparison["analysis"] = json!({
                    "cheapest": product_summary(cheapest),
                    "most_expensive": product_summary(most_expensive),
                    "price_difference": price_difference,
                    "savings": format!(
                        "Save ${price_difference} by choosing '{}'",
                        cheapest.title
                    ),
                });
            }
        }

        ctx.record_comparison(set).await;

        Ok(comparison)
    }
}

pub struct ClearCart;

#[async_trait]
impl Tool for ClearCart {
    fn name(&self) -> &'static str {
        "clear_cart"
    }

    async fn execute(&self, ctx: &ToolContext, _input: Value) -> Result<Value> {
        ctx.carts.clear(&ctx.session_id).await?;
        Ok(json!({ "success": true, "message": "Cart cleared" }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use carty_catalog::client::InMemoryCatalog;
    use carty_core::domain::product::{Product, ProductId};
    use carty_core::reference::store::ReferenceStore;
    use carty_db::repositories::{
        InMemoryCartRepository, InMemoryProductCacheRepository, ProductCacheRepository,
    };

    use super::{ToolContext, ToolRegistry};

    fn product(id: i64, title: &str, price: &str, category: &str) -> Product {
        Product {
            id: ProductId(id),
            title: title.to_string(),
            price: price.parse::<Decimal>().expect("test price"),
            category: Some(category.to_string()),
            description: Some(format!("{title} description")),
            image: Some(format!("https://img.example/{id}.png")),
        }
    }

    fn catalog_fixture() -> Vec<Product> {
        vec![
            product(1, "Wireless Headphones", "89.99", "electronics"),
            product(2, "USB-C Monitor", "249.00", "electronics"),
            product(3, "Mechanical Keyboard", "120.00", "electronics"),
            product(4, "Denim Jacket", "55.50", "men's clothing"),
            product(5, "Gold Ring", "168.00", "jewelery"),
            product(6, "Smart Speaker", "49.99", "electronics"),
            product(7, "Webcam", "75.00", "electronics"),
        ]
    }

    fn context() -> ToolContext {
        ToolContext {
            session_id: "tool-test".to_string(),
            references: Arc::new(Mutex::new(ReferenceStore::new())),
            catalog: Arc::new(InMemoryCatalog::new(catalog_fixture())),
            carts: Arc::new(InMemoryCartRepository::default()),
            product_cache: Arc::new(InMemoryProductCacheRepository::default()),
        }
    }

    async fn run(ctx: &ToolContext, tool: &str, input: Value) -> Value {
        ToolRegistry::with_default_tools()
            .execute(tool, ctx, input)
            .await
            .expect("tool execution should succeed")
    }

    #[test]
    fn registry_lists_the_full_tool_set() {
        let registry = ToolRegistry::with_default_tools();
        assert_eq!(
            registry.names(),
            vec![
                "add_to_cart",
                "clear_cart",
                "compare_products",
                "get_cart",
                "get_product_details",
                "remove_from_cart",
                "search_products",
            ]
        );
    }

    #[tokio::test]
    async fn search_truncates_to_five_and_records_references() {
        let ctx = context();
        let result =
            run(&ctx, "search_products", json!({"query": "electronics"})).await;

        let listing = result.as_array().expect("search returns a list");
        assert_eq!(listing.len(), 5);

        let snapshot = ctx.snapshot().await;
        let remembered = snapshot.last_search_results.expect("search should be remembered");
        assert_eq!(remembered.len(), 5);
        assert_eq!(remembered.position(1).map(|p| p.id), Some(ProductId(1)));
    }

    #[tokio::test]
    async fn search_applies_price_bounds() {
        let ctx = context();
        let result = run(
            &ctx,
            "search_products",
            json!({"query": "electronics", "price_range": {"min": 70, "max": 130}}),
        )
        .await;

        let ids: Vec<i64> = result
            .as_array()
            .expect("list")
            .iter()
            .map(|item| item["id"].as_i64().expect("id"))
            .collect();
        assert_eq!(ids, vec![1, 3, 7]);
    }

    #[tokio::test]
    async fn search_rejects_malformed_price_range() {
        let ctx = context();
        let result = run(
            &ctx,
            "search_products",
            json!({"query": "electronics", "price_range": "cheap-ish"}),
        )
        .await;
        assert!(result["error"].as_str().expect("error").contains("price_range"));
    }

    #[tokio::test]
    async fn add_to_cart_resolves_ordinal_references() {
        let ctx = context();
        run(&ctx, "search_products", json!({"query": "electronics"})).await;

        let result =
            run(&ctx, "add_to_cart", json!({"reference": "the first one"})).await;
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["product_id"], json!(1));

        let cart = run(&ctx, "get_cart", json!({})).await;
        assert_eq!(cart["total_items"], json!(1));
        assert_eq!(cart["items"][0]["product_id"], json!(1));
    }

    #[tokio::test]
    async fn add_to_cart_without_context_asks_for_clarification() {
        let ctx = context();
        let result = run(&ctx, "add_to_cart", json!({"reference": "the first one"})).await;
        assert!(result["error"]
            .as_str()
            .expect("error")
            .contains("Could not resolve reference"));

        // The miss must not have touched the cart.
        let cart = run(&ctx, "get_cart", json!({})).await;
        assert_eq!(cart["total_items"], json!(0));
    }

    #[tokio::test]
    async fn add_to_cart_requires_some_identifier() {
        let ctx = context();
        let result = run(&ctx, "add_to_cart", json!({})).await;
        assert_eq!(result["error"], json!("Product ID or reference required"));
    }

    #[tokio::test]
    async fn explicit_product_ids_work_without_any_reference_state() {
        let ctx = context();
        let result =
            run(&ctx, "add_to_cart", json!({"product_id": 4, "quantity": 2})).await;
        assert_eq!(result["success"], json!(true));

        let cart = run(&ctx, "get_cart", json!({})).await;
        assert_eq!(cart["total_items"], json!(2));
        assert_eq!(cart["items"][0]["product_title"], json!("Denim Jacket"));
    }

    #[tokio::test]
    async fn compare_first_two_then_add_the_cheaper_one() {
        let ctx = context();
        run(&ctx, "search_products", json!({"query": "electronics"})).await;

        let comparison =
            run(&ctx, "compare_products", json!({"reference": "first two"})).await;
        assert_eq!(comparison["count"], json!(2));
        assert_eq!(comparison["analysis"]["cheapest"]["id"], json!(1));
        assert_eq!(comparison["analysis"]["most_expensive"]["id"], json!(2));
        assert_eq!(comparison["analysis"]["price_difference"], json!("159.01"));

        let result = run(&ctx, "add_to_cart", json!({"reference": "cheaper one"})).await;
        assert_eq!(result["product_id"], json!(1));
    }

    #[tokio::test]
    async fn compare_accepts_explicit_ids_and_skips_unknown_ones() {
        let ctx = context();
        let comparison =
            run(&ctx, "compare_products", json!({"product_ids": "4, 5, 999"})).await;
        assert_eq!(comparison["count"], json!(2));

        let snapshot = ctx.snapshot().await;
        let compared = snapshot.last_compared_products.expect("comparison remembered");
        assert_eq!(compared.len(), 2);
    }

    #[tokio::test]
    async fn compare_without_candidates_is_a_user_error() {
        let ctx = context();
        let result = run(&ctx, "compare_products", json!({})).await;
        assert!(result["error"].as_str().expect("error").contains("No products to compare"));

        let miss = run(&ctx, "compare_products", json!({"reference": "first two"})).await;
        assert!(miss["error"]
            .as_str()
            .expect("error")
            .contains("Could not resolve reference"));
    }

    #[tokio::test]
    async fn get_product_details_reads_through_the_cache() {
        let ctx = context();
        let details = run(&ctx, "get_product_details", json!({"product_id": 5})).await;
        assert_eq!(details["title"], json!("Gold Ring"));

        let cached = ctx
            .product_cache
            .find_by_id(ProductId(5))
            .await
            .expect("cache lookup");
        assert!(cached.is_some(), "details fetch should write through the cache");

        let missing = run(&ctx, "get_product_details", json!({"product_id": 424242})).await;
        assert_eq!(missing["error"], json!("Product 424242 not found"));
    }

    #[tokio::test]
    async fn remove_and_clear_round_trip() {
        let ctx = context();
        run(&ctx, "add_to_cart", json!({"product_id": 1})).await;
        run(&ctx, "add_to_cart", json!({"product_id": 2})).await;

        let removed = run(&ctx, "remove_from_cart", json!({"product_id": 1})).await;
        assert_eq!(removed["success"], json!(true));
        let cart = run(&ctx, "get_cart", json!({})).await;
        assert_eq!(cart["items"].as_array().expect("items").len(), 1);

        let cleared = run(&ctx, "clear_cart", json!({})).await;
        assert_eq!(cleared["message"], json!("Cart cleared"));
        let cart = run(&ctx, "get_cart", json!({})).await;
        assert_eq!(cart["total_items"], json!(0));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_touching_the_cart() {
        let ctx = context();
        let result =
            run(&ctx, "add_to_cart", json!({"product_id": 1, "quantity": 0})).await;
        assert!(result["error"].as_str().expect("error").contains("zero quantity"));

        let cart = run(&ctx, "get_cart", json!({})).await;
        assert_eq!(cart["total_items"], json!(0));
    }
}
