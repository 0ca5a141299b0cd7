pub mod error;
pub mod types;

#[cfg(feature = "liquidity")]
pub mod liquidity;

pub use error::RiskError;
pub use types::*;

/// Standard result type for all liquidity-risk operations
pub type RiskResult<T> = Result<T, RiskError>;
