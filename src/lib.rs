//! # portfolio-alloc
//!
//! $$
//! \mathbf{w}^\* = \mathcal{S}(P, \mathcal{M}), \qquad \sum_i w_i \in \\{0, 1\\},\ w_i \ge 0
//! $$
//!
//! Target-allocation strategies over a matrix of historical prices: sector
//! relative strength, a GTAA moving-average trend filter, maximum Sharpe and
//! minimum volatility on a Ledoit-Wolf shrunk covariance.

pub mod portfolio;

pub use portfolio::Allocation;
pub use portfolio::AllocationStrategy;
pub use portfolio::PriceMatrix;
pub use portfolio::SectorMap;
pub use portfolio::Strategy;
pub use portfolio::StrategyEngine;
pub use portfolio::StrategyError;
pub use portfolio::StrategyKind;
