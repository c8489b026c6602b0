use super::{param_or, DirectiveHandler, DocumentStore, ToolError, ToolOutput, ToolSpec};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use indexmap::IndexMap;
use llm::{LLMProvider, LLMRequest, Message};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const QUOTE_VALIDITY_DAYS: i64 = 30;
const FALLBACK_UNIT_PRICE: f64 = 199.0;

/// Priced content of a quote, as written by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteContent {
    #[serde(default)]
    pub product_description: String,
    #[serde(default, deserialize_with = "deserialize_price")]
    pub unit_price: f64,
    #[serde(default, deserialize_with = "deserialize_price")]
    pub total_price: f64,
    #[serde(default)]
    pub terms: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

impl QuoteContent {
    /// Deterministic content used when the model is unavailable or its answer
    /// cannot be parsed
    pub fn fallback(parameters: &IndexMap<String, String>) -> Self {
        let product = param_or(parameters, "product", "Software License");
        let quantity = parse_number(param_or(parameters, "quantity", "1")).unwrap_or(1.0);
        let discount = parameters
            .get("discount")
            .and_then(|d| parse_number(d))
            .map(|pct| pct / 100.0)
            .unwrap_or(0.0);

        Self {
            product_description: format!(
                "Professional {product} designed for enterprise organizations. Includes standard features and basic support."
            ),
            unit_price: FALLBACK_UNIT_PRICE,
            total_price: quantity * FALLBACK_UNIT_PRICE * (1.0 - discount),
            terms: "Payment due within 30 days. One year warranty included.".to_string(),
            additional_notes: Some(
                "Professional implementation support available. Regular updates included in first year."
                    .to_string(),
            ),
        }
    }

    /// Parse a model answer, with or without a surrounding code fence
    pub fn parse(answer: &str) -> Result<Self> {
        Ok(serde_json::from_str(strip_code_fence(answer))?)
    }
}

/// The stored quote document
#[derive(Debug, Clone, Serialize)]
struct QuoteDocument<'a> {
    quote_id: String,
    customer_name: &'a str,
    quote_name: &'a str,
    product: &'a str,
    quantity: &'a str,
    discount: Option<&'a str>,
    created_at: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    #[serde(flatten)]
    content: &'a QuoteContent,
}

fn strip_code_fence(answer: &str) -> &str {
    let trimmed = answer.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Numbers like `1,250`, `$99.50` or `10%`
fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%') && !c.is_whitespace())
        .collect();
    cleaned.parse().ok()
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("price out of range")),
        Value::String(s) => parse_number(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid price: {s}"))),
        other => Err(serde::de::Error::custom(format!("invalid price: {other}"))),
    }
}

/// File name safe for the document store
fn quote_filename(quote_id: &str, customer: &str) -> String {
    let customer: String = customer
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{quote_id}_quote_{customer}.json")
}

/// Generates a priced quote document for a customer
pub struct GenerateQuoteTool {
    provider: Arc<dyn LLMProvider>,
    store: Arc<dyn DocumentStore>,
}

impl GenerateQuoteTool {
    pub fn new(provider: Arc<dyn LLMProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { provider, store }
    }

    async fn generate_content(&self, parameters: &IndexMap<String, String>) -> QuoteContent {
        let prompt = format!(
            "Generate a realistic business quote for the following request:\n\
             - Customer: {}\n\
             - Product: {}\n\
             - Quantity: {}\n\
             - Discount: {}\n\
             - Requirements: {}\n\n\
             Provide a JSON response with:\n\
             - product_description: Concise description (max 100 words) of the product/service\n\
             - unit_price: Realistic unit price in USD (between $50-$500 for software licenses)\n\
             - total_price: Total price after discount in USD (numeric value only)\n\
             - terms: Brief professional terms (2-3 sentences)\n\
             - additional_notes: Short benefits summary (2-3 sentences)\n\n\
             Keep pricing realistic for B2B software. Make descriptions concise and professional.",
            param_or(parameters, "customer_name", "Customer"),
            param_or(parameters, "product", "Software License"),
            param_or(parameters, "quantity", "1"),
            param_or(parameters, "discount", "None"),
            param_or(parameters, "requirements", "Standard requirements"),
        );

        let request = LLMRequest {
            messages: vec![Message::user(prompt)],
            temperature: Some(0.3),
            max_tokens: Some(500),
            ..Default::default()
        };

        let answer = match self.provider.send_message(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("Quote content generation failed, using fallback: {}", e);
                return QuoteContent::fallback(parameters);
            }
        };

        QuoteContent::parse(&answer).unwrap_or_else(|e| {
            let preview: String = answer.chars().take(200).collect();
            warn!(
                "Failed to parse quote content ({}), using fallback. Content: {}",
                e, preview
            );
            QuoteContent::fallback(parameters)
        })
    }

    async fn create_quote(&self, parameters: &IndexMap<String, String>) -> Result<ToolOutput> {
        let quote_id = Uuid::new_v4().to_string();
        let content = self.generate_content(parameters).await;

        let customer_name = param_or(parameters, "customer_name", "Unknown");
        let quote_name = param_or(parameters, "quote_name", "Quote Document");
        let created_at = Utc::now();
        let document = QuoteDocument {
            quote_id: quote_id.clone(),
            customer_name,
            quote_name,
            product: param_or(parameters, "product", "Software License"),
            quantity: param_or(parameters, "quantity", "1"),
            discount: parameters.get("discount").map(String::as_str),
            created_at,
            valid_until: created_at + ChronoDuration::days(QUOTE_VALIDITY_DAYS),
            content: &content,
        };

        let filename = quote_filename(&quote_id, param_or(parameters, "customer_name", "customer"));
        let bytes = serde_json::to_vec_pretty(&document)?;
        let location = self.store.save(&filename, bytes).await?;
        info!("Quote {} stored at {}", quote_id, location);

        Ok(ToolOutput::new(location)
            .with_field("quote_id", quote_id)
            .with_field("customer_name", customer_name)
            .with_field("quote_name", quote_name)
            .with_field("filename", filename)
            .with_field("total_amount", content.total_price))
    }
}

#[async_trait]
impl DirectiveHandler for GenerateQuoteTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "generate_quote",
            status: "Generating Quote",
            message: "Creating your quote document...",
        }
    }

    async fn execute(&self, parameters: &IndexMap<String, String>) -> Result<ToolOutput, ToolError> {
        info!("Executing generate_quote with {:?}", parameters);
        self.create_quote(parameters)
            .await
            .map_err(|e| ToolError::Execution(anyhow!("Failed to generate quote: {:#}", e)))
    }
}
