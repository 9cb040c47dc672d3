//! The typed response envelope handed to the presentation layer.
//!
//! Agent replies are a single JSON object `{"type": ..., "data": ...}`,
//! sometimes wrapped in a markdown code fence by an uncooperative model.
//! This module owns that wire shape: parsing it tolerantly and normalizing
//! arbitrary model output into canonical envelope JSON.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::CartLine;
use crate::domain::product::Product;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub results: Vec<Product>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Decimal>,
}

/// Discriminated response envelope. `type` selects the renderer, `data`
/// carries the matching payload; an envelope with a mismatched payload does
/// not deserialize and therefore never reaches the consumer half-typed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum MessageEnvelope {
    Text(TextPayload),
    Products(ProductsPayload),
    Comparison(ComparisonPayload),
    Cart(CartPayload),
}

impl MessageEnvelope {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::Text(TextPayload { text: text.into() })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Products(_) => "products",
            Self::Comparison(_) => "comparison",
            Self::Cart(_) => "cart",
        }
    }
}

/// Remove a surrounding markdown code fence, if any.
///
/// Handles the shapes models actually emit: a leading line of three
/// backticks with an optional language tag, and a trailing fence that may
/// not have arrived yet on a partial buffer.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        // Fence line still incomplete: only the language tag has arrived.
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Full-structure parse of a (possibly fenced) buffer into an envelope.
/// Anything that is not a complete, well-typed envelope is `None`.
pub fn parse_envelope(text: &str) -> Option<MessageEnvelope> {
    serde_json::from_str(strip_code_fence(text)).ok()
}

/// Canonicalize raw model output: pass a structured envelope through,
/// wrap everything else as a `text` envelope.
pub fn normalize_reply(raw: &str) -> MessageEnvelope {
    parse_envelope(raw)
        .unwrap_or_else(|| MessageEnvelope::plain_text(strip_code_fence(raw).to_string()))
}
