use crate::domain::card::{CardProduct, EarningRule};
use serde::{Deserialize, Serialize};

/// One ranked card in a recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardScore {
    pub card: CardProduct,
    pub effective_rate_cents_per_dollar: f64,
    /// The earning rule the rate was computed from.
    pub rule: EarningRule,
    /// Whether a spending cap reduced the rate via blending.
    pub cap_applied: bool,
    pub explanation: String,
    pub notes: Vec<String>,
}

/// Engine output for one query. Created fresh per query; not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedRecommendation {
    pub query: String,
    pub resolved_category: String,
    /// Ranked best-first, truncated to the requested maximum.
    pub results: Vec<CardScore>,
    pub explanation: String,
}
