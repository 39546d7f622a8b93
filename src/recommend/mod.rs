//! Prose recommendations layered on top of a numeric projection.
//!
//! The calculator never depends on these: a provider only reads the
//! already-computed [`ProjectionResult`]. Network-backed providers are
//! wrapped in [`FallbackRecommendationProvider`] so callers always get a
//! recommendation of the same shape.

mod generative;
mod retry;
mod static_provider;

pub use generative::{GenerativeRecommendationProvider, build_prompt};
pub use static_provider::StaticRecommendationProvider;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{RecommendationMode, RecommendationsConfig};
use crate::core::{Allocation, FinancialProfile, ProjectionResult, WealthTaxRules};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationRequest {
    pub profile: FinancialProfile,
    pub projection: ProjectionResult,
    /// Calendar year used to label the first wealth-journey milestone.
    pub as_of_year: i32,
}

impl RecommendationRequest {
    pub fn retirement_year(&self) -> i32 {
        self.as_of_year + self.profile.years_to_grow() as i32
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub allocation: Allocation,
    #[serde(flatten)]
    pub details: RecommendationDetails,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationDetails {
    pub allocation_rationale: String,
    pub personalized_strategy: PersonalizedStrategy,
    #[serde(default)]
    pub dutch_products: Vec<DutchProduct>,
    #[serde(default)]
    pub wealth_journey: Vec<Milestone>,
    pub tax_optimization: TaxOptimization,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedStrategy {
    pub summary: String,
    pub feasibility: String,
    #[serde(default)]
    pub action_steps: Vec<ActionStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Priority {
    #[serde(alias = "high")]
    High,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutchProduct {
    pub name: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub year: i32,
    pub wealth: i64,
    pub milestone: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxOptimization {
    pub box3_strategy: String,
    pub pension_recommendations: String,
    pub estimated_annual_savings: i64,
}

impl Recommendation {
    /// Rejects payloads that deserialize but cannot be shown as-is.
    pub fn validate(&self) -> Result<()> {
        let total = self.allocation.total();
        if total != 100 {
            bail!("allocation must sum to 100, got {total}");
        }
        if self.details.personalized_strategy.summary.trim().is_empty() {
            bail!("personalizedStrategy.summary is empty");
        }
        Ok(())
    }
}

#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recommend(&self, request: &RecommendationRequest) -> Result<Recommendation>;
}

/// Tries `primary` and substitutes the deterministic static recommendation
/// on any failure. Never returns an error.
pub struct FallbackRecommendationProvider {
    primary: Box<dyn RecommendationProvider>,
    fallback: StaticRecommendationProvider,
}

impl FallbackRecommendationProvider {
    pub fn new(
        primary: Box<dyn RecommendationProvider>,
        fallback: StaticRecommendationProvider,
    ) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl RecommendationProvider for FallbackRecommendationProvider {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn recommend(&self, request: &RecommendationRequest) -> Result<Recommendation> {
        match self.primary.recommend(request).await {
            Ok(recommendation) => {
                debug!(provider = self.primary.name(), "Using primary recommendation");
                Ok(recommendation)
            }
            Err(e) => {
                warn!(
                    provider = self.primary.name(),
                    error = %format!("{e:#}"),
                    "Recommendation provider failed; using static fallback"
                );
                self.fallback.recommend(request).await
            }
        }
    }
}

pub fn build_recommendation_provider(
    config: &RecommendationsConfig,
    tax_rules: &WealthTaxRules,
) -> Result<Arc<dyn RecommendationProvider>> {
    let fallback = StaticRecommendationProvider::new(tax_rules);
    match config.mode {
        RecommendationMode::Static => Ok(Arc::new(fallback)),
        RecommendationMode::Generative => {
            let api_key = match std::env::var(&config.generative.api_key_env) {
                Ok(key) if !key.trim().is_empty() => key,
                _ => {
                    warn!(
                        env = %config.generative.api_key_env,
                        "No API key for generative recommendations; using static provider"
                    );
                    return Ok(Arc::new(fallback));
                }
            };
            let primary = GenerativeRecommendationProvider::new(&config.generative, api_key)?;
            Ok(Arc::new(FallbackRecommendationProvider::new(
                Box::new(primary),
                fallback,
            )))
        }
    }
}
