use serde::{Deserialize, Serialize};

pub const DEFAULT_INFLATION_RATE: f64 = 0.02;
pub const DEFAULT_WITHDRAWAL_RATE: f64 = 0.035;
pub const DEFAULT_ANNUAL_GROWTH_RATE: f64 = 0.065;
pub const BOX3_EXEMPTION_THRESHOLD: f64 = 59_357.0;
pub const BOX3_ASSUMED_RETURN_RATE: f64 = 0.06;
pub const BOX3_TAX_RATE: f64 = 0.36;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub current_age: u32,
    pub retirement_age: u32,
    pub current_wealth: f64,
    pub monthly_expenses: f64,
    pub inflation_rate: f64,
}

impl FinancialProfile {
    pub fn years_to_grow(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }
}

/// Flat Box 3 estimate: a fictitious return on wealth above the exemption,
/// taxed at a single rate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct WealthTaxRules {
    pub exemption_threshold: f64,
    pub assumed_return_rate: f64,
    pub tax_rate: f64,
}

impl Default for WealthTaxRules {
    fn default() -> Self {
        Self {
            exemption_threshold: BOX3_EXEMPTION_THRESHOLD,
            assumed_return_rate: BOX3_ASSUMED_RETURN_RATE,
            tax_rate: BOX3_TAX_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Assumptions {
    pub withdrawal_rate: f64,
    pub annual_growth_rate: f64,
    pub wealth_tax: WealthTaxRules,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            withdrawal_rate: DEFAULT_WITHDRAWAL_RATE,
            annual_growth_rate: DEFAULT_ANNUAL_GROWTH_RATE,
            wealth_tax: WealthTaxRules::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStrategy {
    #[default]
    Fixed,
    #[serde(alias = "ageBucketed", alias = "age_bucketed")]
    AgeBucketed,
}

/// Integer percentages across the four asset classes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub stocks: u8,
    pub bonds: u8,
    pub real_estate: u8,
    pub cash: u8,
}

impl Allocation {
    pub const fn new(stocks: u8, bonds: u8, real_estate: u8, cash: u8) -> Self {
        Self {
            stocks,
            bonds,
            real_estate,
            cash,
        }
    }

    pub fn total(&self) -> u32 {
        self.stocks as u32 + self.bonds as u32 + self.real_estate as u32 + self.cash as u32
    }
}

/// Unrounded intermediate values of a projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionBreakdown {
    pub years_to_grow: u32,
    pub months: u32,
    pub monthly_growth_rate: f64,
    pub current_age: u32,
    pub current_wealth: f64,
    pub monthly_need_future: f64,
    pub target_nest_egg: f64,
    pub future_value_of_current_wealth: f64,
    pub gap_to_fill: f64,
    pub monthly_savings: f64,
    pub estimated_wealth_tax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    #[serde(rename = "monthlyNeed")]
    pub monthly_need_future: i64,
    pub target_nest_egg: i64,
    pub gap_to_fill: i64,
    pub monthly_savings: i64,
    #[serde(rename = "estimatedBox3Tax")]
    pub estimated_wealth_tax: i64,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WealthPoint {
    pub year: u32,
    pub wealth: i64,
}
