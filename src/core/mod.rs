mod allocation;
mod engine;
mod error;
mod types;

pub use allocation::{FIXED_ALLOCATION, age_bucketed_allocation};
pub use engine::{
    MAX_AMOUNT, MAX_RETIREMENT_AGE, project, project_breakdown, project_from_breakdown,
    validate_assumptions, validate_profile, wealth_path, wealth_tax,
};
pub use error::ProjectionError;
pub use types::{
    Allocation, AllocationStrategy, Assumptions, DEFAULT_INFLATION_RATE, FinancialProfile,
    ProjectionBreakdown, ProjectionResult, WealthPoint, WealthTaxRules,
};
