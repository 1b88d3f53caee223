//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Price data model, return estimation and the four allocation strategies.

pub mod data;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod momentum;
pub mod optimizers;
pub mod solver;
pub mod synthetic;
pub mod trend;
pub mod types;
pub mod validate;

pub use data::PriceMatrix;
pub use data::SectorMap;
pub use data::UNKNOWN_SECTOR;
pub use engine::AllocationStrategy;
pub use engine::Strategy;
pub use engine::StrategyEngine;
pub use error::OptimizationError;
pub use error::StrategyError;
pub use error::StrategyResult;
pub use estimator::EstimatorConfig;
pub use estimator::ReturnEstimator;
pub use estimator::ReturnMethod;
pub use estimator::ReturnStatistics;
pub use estimator::Shrinkage;
pub use estimator::ShrunkCovariance;
pub use estimator::TRADING_DAYS_PER_YEAR;
pub use estimator::annualized_mean_return;
pub use estimator::compounded_annual_return;
pub use estimator::ledoit_wolf;
pub use estimator::sample_covariance;
pub use estimator::shrunk_covariance;
pub use momentum::SectorRelativeStrength;
pub use momentum::SectorRelativeStrengthConfig;
pub use momentum::lookback_returns;
pub use momentum::rank_sectors;
pub use optimizers::DEFAULT_RISK_FREE_RATE;
pub use optimizers::MaxSharpe;
pub use optimizers::MaxSharpeConfig;
pub use optimizers::MinVolatility;
pub use optimizers::MinVolatilityConfig;
pub use optimizers::WEIGHT_DECIMALS;
pub use optimizers::clean_weights;
pub use optimizers::optimize_max_sharpe;
pub use optimizers::optimize_min_volatility;
pub use optimizers::portfolio_performance;
pub use solver::QpSolution;
pub use solver::SolverConfig;
pub use solver::solve_budget_qp;
pub use synthetic::GbmAsset;
pub use synthetic::GbmUniverse;
pub use synthetic::business_days;
pub use trend::Gtaa;
pub use trend::GtaaConfig;
pub use trend::TRADING_DAYS_PER_MONTH;
pub use trend::trailing_moving_average;
pub use types::Allocation;
pub use types::Diagnostics;
pub use types::OptimizerDiagnostics;
pub use types::PortfolioPerformance;
pub use types::SectorDiagnostics;
pub use types::SectorScore;
pub use types::StrategyKind;
pub use types::TrendDiagnostics;
pub use types::WEIGHT_TOLERANCE;
pub use validate::validate;
pub use validate::validate_risk_free;
pub use validate::validate_window;
