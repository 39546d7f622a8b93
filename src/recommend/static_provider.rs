use anyhow::Result;
use async_trait::async_trait;

use super::{
    ActionStep, DutchProduct, Milestone, PersonalizedStrategy, Priority, Recommendation,
    RecommendationDetails, RecommendationProvider, RecommendationRequest, TaxOptimization,
};
use crate::core::{WealthTaxRules, age_bucketed_allocation};

/// Interim milestones as (years after `as_of_year`, text). Wealth shown is
/// the savings accumulated by then, ignoring growth.
const INTERIM_MILESTONES: [(i32, &str); 3] = [
    (4, "Maximize investments in a broad AEX or global index fund."),
    (
        8,
        "Review the portfolio; move excess cash into higher-yielding investments.",
    ),
    (
        12,
        "Open a lijfrente account to further tax-shelter your investments.",
    ),
];

/// Deterministic hand-written recommendation used when no generative
/// provider is configured or when it fails.
#[derive(Debug, Clone)]
pub struct StaticRecommendationProvider {
    exemption_threshold: i64,
}

impl StaticRecommendationProvider {
    pub fn new(tax_rules: &WealthTaxRules) -> Self {
        Self {
            exemption_threshold: tax_rules.exemption_threshold.round() as i64,
        }
    }

    pub fn build(&self, request: &RecommendationRequest) -> Recommendation {
        let profile = &request.profile;
        let projection = &request.projection;
        let allocation = age_bucketed_allocation(profile.current_age);

        let summary = format!(
            "To achieve early retirement at age {}, aim to save €{}/mo. \
             Use the 30% Jaarruimte deduction to reduce Box 1 tax, and keep taxable \
             Box 3 wealth optimized using the €{} exemption.",
            profile.retirement_age,
            format_euros(projection.monthly_savings),
            format_euros(self.exemption_threshold),
        );
        let feasibility = if projection.gap_to_fill == 0 {
            format!(
                "Your current wealth already compounds past the €{} target; focus on \
                 keeping Box 3 drag low.",
                format_euros(projection.target_nest_egg)
            )
        } else {
            format!(
                "With consistent saving and Box 3 optimization, reaching the €{} target \
                 is feasible.",
                format_euros(projection.target_nest_egg)
            )
        };

        Recommendation {
            allocation,
            details: RecommendationDetails {
                allocation_rationale: allocation_rationale(allocation.stocks),
                personalized_strategy: PersonalizedStrategy {
                    summary,
                    feasibility,
                    action_steps: action_steps(self.exemption_threshold),
                },
                dutch_products: dutch_products(),
                wealth_journey: wealth_journey(request),
                tax_optimization: TaxOptimization {
                    box3_strategy: "Invest in products that maximize returns while keeping \
                                    taxable Box 3 wealth close to the exemption for optimal \
                                    tax efficiency."
                        .to_string(),
                    pension_recommendations: "Contribute to a private pension (lijfrente) to \
                                              get tax deductions that can fund early \
                                              retirement income."
                        .to_string(),
                    estimated_annual_savings: projection.estimated_wealth_tax,
                },
            },
        }
    }
}

#[async_trait]
impl RecommendationProvider for StaticRecommendationProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn recommend(&self, request: &RecommendationRequest) -> Result<Recommendation> {
        Ok(self.build(request))
    }
}

fn allocation_rationale(stocks: u8) -> String {
    let horizon = match stocks {
        80..=u8::MAX => "a long horizon leaves room to ride out equity drawdowns",
        70..=79 => "a balanced growth tilt still favours equities",
        60..=69 => "a shorter horizon calls for more bonds and real assets",
        _ => "retirement is close, so capital preservation comes first",
    };
    format!("{stocks}% in stocks and ETFs because {horizon}.")
}

fn action_steps(exemption_threshold: i64) -> Vec<ActionStep> {
    vec![
        ActionStep {
            priority: Priority::High,
            title: "Maximize Pension".to_string(),
            description: "Use your Jaarruimte. Invest up to 30% tax-free into a blocked \
                          pension account."
                .to_string(),
            tag: "NL Tax".to_string(),
        },
        ActionStep {
            priority: Priority::High,
            title: "Invest in Index Funds".to_string(),
            description: "Buy global ETFs (e.g. VWRL). Target 8-10% ROI to outpace the 6% \
                          fictitious Box 3 return."
                .to_string(),
            tag: "Strategy".to_string(),
        },
        ActionStep {
            priority: Priority::Medium,
            title: "Optimize Box 3".to_string(),
            description: format!(
                "Keep liquid savings low and make full use of the €{} exemption.",
                format_euros(exemption_threshold)
            ),
            tag: "Tax Hack".to_string(),
        },
    ]
}

fn dutch_products() -> Vec<DutchProduct> {
    [
        (
            "iShares AEX ETF",
            "ETF",
            "Low fees and strong historical returns based on the Dutch stock market.",
        ),
        (
            "ABN AMRO Lijfrente",
            "Lijfrente",
            "Tax benefits that defer income tax while saving for retirement.",
        ),
        (
            "Triodos sustainable funds",
            "Sustainable Investment Fund",
            "Aligns investments with ethical values while aiming for decent returns.",
        ),
        (
            "DEGIRO account",
            "Investment brokerage",
            "Low fees and a wide range of investment options including Dutch ETFs.",
        ),
    ]
    .into_iter()
    .map(|(name, category, description)| DutchProduct {
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
    })
    .collect()
}

fn wealth_journey(request: &RecommendationRequest) -> Vec<Milestone> {
    let years_to_grow = request.profile.years_to_grow() as i32;
    let annual_savings = request.projection.monthly_savings * 12;

    let mut journey = vec![Milestone {
        year: request.as_of_year,
        wealth: annual_savings,
        milestone: format!(
            "Increase your savings rate to €{}/month.",
            format_euros(request.projection.monthly_savings)
        ),
    }];
    journey.extend(
        INTERIM_MILESTONES
            .iter()
            .filter(|(offset, _)| *offset < years_to_grow)
            .map(|(offset, text)| Milestone {
                year: request.as_of_year + offset,
                wealth: annual_savings * *offset as i64,
                milestone: (*text).to_string(),
            }),
    );
    if years_to_grow > 0 {
        journey.push(Milestone {
            year: request.retirement_year(),
            wealth: request.projection.target_nest_egg,
            milestone: "Start drawing down: turn the portfolio into a retirement income plan."
                .to_string(),
        });
    }
    journey
}

fn format_euros(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
