use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use carty_catalog::client::CatalogSource;
use carty_core::reference::store::{ReferenceSnapshot, ReferenceStore};
use carty_core::stream::envelope::{normalize_reply, strip_code_fence, MessageEnvelope};
use carty_db::repositories::{CartRepository, ProductCacheRepository};

use crate::llm::LlmClient;
use crate::tools::{ToolContext, ToolRegistry};

const SYSTEM_PROMPT: &str = r#"You are a helpful shopping assistant. You help users find products, compare options, and manage their shopping cart.

Rules:
1. Never invent or guess product information. Always fetch real data through tools.
2. Only quote prices and details that came from tool results.
3. Every cart change goes through a tool. Never claim a cart changed without calling one.
4. Be concise.

Available tools:
- search_products  input: {"query": string, "category"?: string, "price_range"?: {"min"?: number, "max"?: number}}
- get_product_details  input: {"product_id": integer}
- add_to_cart  input: {"product_id"?: integer, "quantity"?: integer, "reference"?: string}
- remove_from_cart  input: {"product_id": integer}
- get_cart  input: {}
- compare_products  input: {"reference"?: string, "product_ids"?: [integer]}
- clear_cart  input: {}

To invoke a tool, reply with ONLY this JSON object and nothing else:
{"tool": "<tool name>", "input": { ... }}
The tool result will be appended to the conversation and you reply again.

Multi-turn references: when the user points at earlier output ("the first one",
"the cheaper one", "first two"), pass the phrase through the reference
parameter - for example add_to_cart with {"reference": "cheaper one"} or
compare_products with {"reference": "first two"}. The tools resolve these
references from conversation state. Do not ask which product was meant.
If a tool reports that a reference could not be resolved, ask the user to
search first or to name a product id.

Your final reply MUST be raw JSON, without markdown fences or surrounding
prose, in exactly one of these shapes:
- {"type": "products", "data": {"results": [...], "text": "explanation"}}
- {"type": "comparison", "data": {"products": [...], "text": "comparison"}}
- {"type": "cart", "data": {"items": [...], "total_items": N, "total_price": P, "text": "summary"}}
- {"type": "text", "data": {"text": "your message"}}
Always include a "text" field with a natural-language explanation."#;

/// Upper bound on tool invocations within one user turn. A model that is
/// still requesting tools past this point is looping, not working.
const MAX_TOOL_ROUNDS: usize = 8;

#[derive(Debug, Deserialize)]
struct ToolCall {
    tool: String,
    #[serde(default)]
    input: Option<Value>,
}

fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    serde_json::from_str(strip_code_fence(reply)).ok()
}

/// Per-turn orchestrator: completes against the LLM, transports requested
/// tool calls to the registry, and normalizes the final reply into a typed
/// envelope. Which tool to call is entirely the model's decision; this
/// runtime only carries it out.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    references: Arc<Mutex<ReferenceStore>>,
    catalog: Arc<dyn CatalogSource>,
    carts: Arc<dyn CartRepository>,
    product_cache: Arc<dyn ProductCacheRepository>,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        catalog: Arc<dyn CatalogSource>,
        carts: Arc<dyn CartRepository>,
        product_cache: Arc<dyn ProductCacheRepository>,
    ) -> Self {
        Self {
            llm,
            tools: ToolRegistry::with_default_tools(),
            references: Arc::new(Mutex::new(ReferenceStore::new())),
            catalog,
            carts,
            product_cache,
        }
    }

    fn context(&self, session_id: &str) -> ToolContext {
        ToolContext {
            session_id: session_id.to_string(),
            references: Arc::clone(&self.references),
            catalog: Arc::clone(&self.catalog),
            carts: Arc::clone(&self.carts),
            product_cache: Arc::clone(&self.product_cache),
        }
    }

    /// Run one user turn to completion and return the canonical envelope.
    ///
    /// Tool failures and LLM failures abort the turn with an error the
    /// transport surfaces as its error control fragment; reference memory
    /// keeps only what successfully completed tools recorded.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<MessageEnvelope> {
        let ctx = self.context(session_id);
        let mut transcript = format!("User: {message}");

        for round in 0..MAX_TOOL_ROUNDS {
            let reply = self.llm.complete(SYSTEM_PROMPT, &transcript).await?;

            let Some(call) = parse_tool_call(&reply) else {
                return Ok(normalize_reply(&reply));
            };

            debug!(
                event_name = "agent.tool.invoke",
                session_id,
                tool = %call.tool,
                round,
                "executing tool call"
            );

            let input = call.input.unwrap_or_else(|| Value::Object(Default::default()));
            let observation = self.tools.execute(&call.tool, &ctx, input).await?;

            transcript.push_str(&format!(
                "\nAssistant: {}\nTool result ({}): {observation}",
                reply.trim(),
                call.tool
            ));
        }

        Err(anyhow!("tool budget exhausted after {MAX_TOOL_ROUNDS} rounds"))
    }

    /// Direct tool dispatch for callers that drive tools themselves.
    pub async fn execute_tool(
        &self,
        session_id: &str,
        name: &str,
        input: Value,
    ) -> Result<Value> {
        let ctx = self.context(session_id);
        self.tools.execute(name, &ctx, input).await
    }

    /// Explicit session reset: forgets remembered search and comparison sets.
    pub async fn reset_session(&self, session_id: &str) {
        self.references.lock().await.clear(session_id);
    }

    /// Read-only view of a session's reference memory.
    pub async fn reference_snapshot(&self, session_id: &str) -> ReferenceSnapshot {
        self.references.lock().await.snapshot(session_id)
    }
}
