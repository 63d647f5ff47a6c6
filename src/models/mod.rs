pub mod enums;
pub mod policy;

pub use enums::*;
pub use policy::*;

use chrono::NaiveDate;
use thiserror::Error;

/// An entity invariant was violated. Always fatal for the document run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid value '{value}' for {field}")]
    InvalidEnum { field: String, value: String },

    #[error("Confidence {value} for {field} is outside [0, 1]")]
    ConfidenceOutOfRange { field: String, value: f32 },

    #[error("Expiration date {expiration} is before effective date {effective}")]
    ExpirationBeforeEffective {
        effective: NaiveDate,
        expiration: NaiveDate,
    },
}
