use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("retirementAge ({retirement_age}) must be >= currentAge ({current_age})")]
    RetirementBeforeCurrentAge {
        current_age: u32,
        retirement_age: u32,
    },
    #[error("retirementAge must be <= {max}, got {actual}")]
    RetirementAgeOutOfRange { max: u32, actual: u32 },
    #[error("{field} must be {requirement}, got {value}")]
    InvalidAmount {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("{field} evaluates to {value:e}, beyond the supported {max:e}")]
    AmountOutOfRange {
        field: &'static str,
        value: f64,
        max: f64,
    },
    #[error("assumption {field} must be {requirement}, got {value}")]
    InvalidAssumption {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
}
