use crate::models::record::round_to;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model used whenever detection fails or an unknown id is supplied.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4";

/// Upper bound on tokens priced in a single calculation.
pub const MAX_PRICED_TOKENS: f64 = 1_000_000_000_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub price_per_mtok: f64, // USD per million input tokens
    pub display_name: String,
}

impl ModelPricing {
    pub fn new(price_per_mtok: f64, display_name: &str) -> Self {
        Self {
            price_per_mtok,
            display_name: display_name.to_string(),
        }
    }

    /// Calculate what `tokens` input tokens would have cost, in USD
    pub fn calculate_cost(&self, tokens: f64) -> f64 {
        (tokens / 1_000_000.0) * self.price_per_mtok
    }
}

/// Result of pricing a number of saved tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSavings {
    #[serde(rename = "costSavingsUSD")]
    pub cost_savings_usd: f64,
    pub model: String,
    pub client: String,
    pub price_per_m_tok: f64,
}

#[derive(Debug, Clone)]
pub struct PricingManager {
    pricing_data: HashMap<String, ModelPricing>,
}

impl PricingManager {
    /// Create new pricing manager with the built-in pricing table
    pub fn new() -> Self {
        let mut pricing_data = HashMap::new();

        let table: &[(&str, f64, &str)] = &[
            ("claude-sonnet-4", 3.0, "Claude Sonnet 4"),
            ("claude-sonnet-4-5", 3.0, "Claude Sonnet 4.5"),
            ("claude-3-5-sonnet", 3.0, "Claude 3.5 Sonnet"),
            ("claude-opus-4", 15.0, "Claude Opus 4"),
            ("claude-opus-4-1", 15.0, "Claude Opus 4.1"),
            ("claude-haiku-4-5", 1.0, "Claude Haiku 4.5"),
            ("claude-3-5-haiku", 0.8, "Claude 3.5 Haiku"),
            ("gpt-4o", 2.5, "GPT-4o"),
            ("gpt-4o-mini", 0.15, "GPT-4o mini"),
            ("gpt-4.1", 2.0, "GPT-4.1"),
            ("gemini-2.5-pro", 1.25, "Gemini 2.5 Pro"),
            ("gemini-2.5-flash", 0.3, "Gemini 2.5 Flash"),
        ];
        for (model, price, display_name) in table {
            pricing_data.insert(model.to_string(), ModelPricing::new(*price, display_name));
        }

        Self { pricing_data }
    }

    /// Get pricing for a specific model
    pub fn get_pricing(&self, model_name: &str) -> Option<&ModelPricing> {
        self.pricing_data.get(model_name)
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.pricing_data.contains_key(model_name)
    }

    /// Get pricing with fallback to the default model if not found
    pub fn get_pricing_with_fallback(&self, model_name: &str) -> ModelPricing {
        self.get_pricing(model_name)
            .or_else(|| self.get_pricing(DEFAULT_MODEL))
            .cloned()
            .unwrap_or_else(|| ModelPricing::new(3.0, "Claude Sonnet 4"))
    }

    pub fn list_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.pricing_data.keys().cloned().collect();
        models.sort();
        models
    }

    /// Price `tokens_saved` for `model`, on behalf of `client`.
    ///
    /// Negative or non-finite input yields a zero result tagged with the
    /// default model. Unknown models are priced at the default rate but keep
    /// their requested id. The dollar amount is rounded to cents.
    pub fn calculate_cost_savings(&self, tokens_saved: f64, model: &str, client: &str) -> CostSavings {
        if !tokens_saved.is_finite() || tokens_saved < 0.0 {
            let pricing = self.get_pricing_with_fallback(DEFAULT_MODEL);
            return CostSavings {
                cost_savings_usd: 0.0,
                model: DEFAULT_MODEL.to_string(),
                client: client.to_string(),
                price_per_m_tok: pricing.price_per_mtok,
            };
        }

        let tokens = tokens_saved.min(MAX_PRICED_TOKENS);
        let pricing = self.get_pricing_with_fallback(model);

        CostSavings {
            cost_savings_usd: round_to(pricing.calculate_cost(tokens), 2),
            model: model.to_string(),
            client: client.to_string(),
            price_per_m_tok: pricing.price_per_mtok,
        }
    }
}

impl Default for PricingManager {
    fn default() -> Self {
        Self::new()
    }
}
