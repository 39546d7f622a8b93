use super::error::ProjectionError;
use super::types::{
    AllocationStrategy, Assumptions, FinancialProfile, ProjectionBreakdown, ProjectionResult,
    WealthPoint, WealthTaxRules,
};

pub const MAX_RETIREMENT_AGE: u32 = 120;
/// Largest euro amount a projection may produce. Keeps every rounded output,
/// and sums of them along the wealth path, well inside `i64`.
pub const MAX_AMOUNT: f64 = 1e15;
const MONTHS_PER_YEAR: u32 = 12;

pub fn project(
    profile: &FinancialProfile,
    assumptions: &Assumptions,
    strategy: AllocationStrategy,
) -> Result<ProjectionResult, ProjectionError> {
    let breakdown = project_breakdown(profile, assumptions)?;
    Ok(project_from_breakdown(&breakdown, strategy))
}

/// Rounds an already validated breakdown into the response figures.
pub fn project_from_breakdown(
    breakdown: &ProjectionBreakdown,
    strategy: AllocationStrategy,
) -> ProjectionResult {
    ProjectionResult {
        monthly_need_future: round_amount(breakdown.monthly_need_future),
        target_nest_egg: round_amount(breakdown.target_nest_egg),
        gap_to_fill: round_amount(breakdown.gap_to_fill),
        monthly_savings: round_amount(breakdown.monthly_savings),
        estimated_wealth_tax: round_amount(breakdown.estimated_wealth_tax),
        allocation: strategy.allocation_for(breakdown.current_age),
    }
}

pub fn project_breakdown(
    profile: &FinancialProfile,
    assumptions: &Assumptions,
) -> Result<ProjectionBreakdown, ProjectionError> {
    validate_profile(profile)?;
    validate_assumptions(assumptions)?;

    let years_to_grow = profile.years_to_grow();
    let months = years_to_grow * MONTHS_PER_YEAR;
    let monthly_growth_rate = assumptions.annual_growth_rate / MONTHS_PER_YEAR as f64;

    let monthly_need_future =
        profile.monthly_expenses * (1.0 + profile.inflation_rate).powi(years_to_grow as i32);
    let target_nest_egg =
        monthly_need_future * MONTHS_PER_YEAR as f64 / assumptions.withdrawal_rate;

    let future_value_of_current_wealth =
        profile.current_wealth * (1.0 + monthly_growth_rate).powi(months as i32);
    let gap_to_fill = (target_nest_egg - future_value_of_current_wealth).max(0.0);
    let monthly_savings = if gap_to_fill > 0.0 {
        level_monthly_payment(gap_to_fill, monthly_growth_rate, months)
    } else {
        0.0
    };

    let breakdown = ProjectionBreakdown {
        years_to_grow,
        months,
        monthly_growth_rate,
        current_age: profile.current_age,
        current_wealth: profile.current_wealth,
        monthly_need_future,
        target_nest_egg,
        future_value_of_current_wealth,
        gap_to_fill,
        monthly_savings,
        estimated_wealth_tax: wealth_tax(profile.current_wealth, &assumptions.wealth_tax),
    };
    check_amounts(&breakdown)?;
    Ok(breakdown)
}

fn check_amounts(breakdown: &ProjectionBreakdown) -> Result<(), ProjectionError> {
    for (field, value) in [
        ("monthlyNeed", breakdown.monthly_need_future),
        ("targetNestEgg", breakdown.target_nest_egg),
        (
            "futureValueOfCurrentWealth",
            breakdown.future_value_of_current_wealth,
        ),
        ("gapToFill", breakdown.gap_to_fill),
        ("monthlySavings", breakdown.monthly_savings),
        ("estimatedBox3Tax", breakdown.estimated_wealth_tax),
    ] {
        if !value.is_finite() || value.abs() > MAX_AMOUNT {
            return Err(ProjectionError::AmountOutOfRange {
                field,
                value,
                max: MAX_AMOUNT,
            });
        }
    }
    Ok(())
}

pub fn wealth_tax(wealth: f64, rules: &WealthTaxRules) -> f64 {
    if wealth <= rules.exemption_threshold {
        return 0.0;
    }
    let taxable_base = wealth - rules.exemption_threshold;
    taxable_base * rules.assumed_return_rate * rules.tax_rate
}

/// Yearly balance when `monthly_savings` is added at the end of every month
/// on top of compounding current wealth. Year 0 is today's wealth.
pub fn wealth_path(breakdown: &ProjectionBreakdown, monthly_savings: f64) -> Vec<WealthPoint> {
    let growth = 1.0 + breakdown.monthly_growth_rate;
    let mut wealth = breakdown.current_wealth;
    let mut points = Vec::with_capacity(breakdown.years_to_grow as usize + 1);
    points.push(WealthPoint {
        year: 0,
        wealth: round_amount(wealth),
    });

    for year in 1..=breakdown.years_to_grow {
        for _ in 0..MONTHS_PER_YEAR {
            wealth = wealth * growth + monthly_savings;
        }
        points.push(WealthPoint {
            year,
            wealth: round_amount(wealth),
        });
    }
    points
}

pub fn validate_profile(profile: &FinancialProfile) -> Result<(), ProjectionError> {
    if profile.retirement_age < profile.current_age {
        return Err(ProjectionError::RetirementBeforeCurrentAge {
            current_age: profile.current_age,
            retirement_age: profile.retirement_age,
        });
    }
    if profile.retirement_age > MAX_RETIREMENT_AGE {
        return Err(ProjectionError::RetirementAgeOutOfRange {
            max: MAX_RETIREMENT_AGE,
            actual: profile.retirement_age,
        });
    }
    if !profile.current_wealth.is_finite() || profile.current_wealth < 0.0 {
        return Err(ProjectionError::InvalidAmount {
            field: "currentWealth",
            requirement: "finite and >= 0",
            value: profile.current_wealth,
        });
    }
    if !profile.monthly_expenses.is_finite() || profile.monthly_expenses <= 0.0 {
        return Err(ProjectionError::InvalidAmount {
            field: "monthlyExpenses",
            requirement: "finite and > 0",
            value: profile.monthly_expenses,
        });
    }
    if !profile.inflation_rate.is_finite() || profile.inflation_rate <= -1.0 {
        return Err(ProjectionError::InvalidAmount {
            field: "inflationRate",
            requirement: "finite and > -1",
            value: profile.inflation_rate,
        });
    }
    Ok(())
}

pub fn validate_assumptions(assumptions: &Assumptions) -> Result<(), ProjectionError> {
    if !assumptions.withdrawal_rate.is_finite() || assumptions.withdrawal_rate <= 0.0 {
        return Err(ProjectionError::InvalidAssumption {
            field: "withdrawal_rate",
            requirement: "finite and > 0",
            value: assumptions.withdrawal_rate,
        });
    }
    if !assumptions.annual_growth_rate.is_finite() || assumptions.annual_growth_rate <= -1.0 {
        return Err(ProjectionError::InvalidAssumption {
            field: "annual_growth_rate",
            requirement: "finite and > -1",
            value: assumptions.annual_growth_rate,
        });
    }
    let tax = &assumptions.wealth_tax;
    for (field, value) in [
        ("wealth_tax.exemption_threshold", tax.exemption_threshold),
        ("wealth_tax.assumed_return_rate", tax.assumed_return_rate),
        ("wealth_tax.tax_rate", tax.tax_rate),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ProjectionError::InvalidAssumption {
                field,
                requirement: "finite and >= 0",
                value,
            });
        }
    }
    Ok(())
}

/// Level end-of-month contribution that accumulates to `target` after
/// `months` periods at `rate` (ordinary annuity, solved for the payment).
fn level_monthly_payment(target: f64, rate: f64, months: u32) -> f64 {
    if months == 0 {
        return target;
    }
    if rate.abs() < 1e-12 {
        return target / months as f64;
    }
    let accumulation = (1.0 + rate).powi(months as i32) - 1.0;
    target * rate / accumulation
}

fn round_amount(value: f64) -> i64 {
    value.round() as i64
}
