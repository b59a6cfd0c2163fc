//! # Portfolio
//!
//! $$
//! S(\mathbf{w}) = \frac{\bar r_p - T}{\mathrm{DR}_p \cdot \rho^{-}_p}
//! $$
//!
//! Downside-risk allocation: aligned market data, scoring and the two-phase
//! optimizer.

pub mod asset;
pub mod cash_flow;
pub mod data;
pub mod engine;
pub mod genetic;
pub mod market;
pub mod optimizer;
pub mod refine;
pub mod report;
pub mod scorer;
pub mod types;

pub use asset::Asset;
pub use asset::AssetReturnModel;
pub use cash_flow::required_return_from_cash_flows;
pub use data::covariance_matrix;
pub use data::downside_correlation;
pub use data::downside_risk;
pub use data::sortino_score;
pub use engine::AllocationEngine;
pub use genetic::GeneticSeeder;
pub use market::AlignedMarketMatrix;
pub use market::MatrixCache;
pub use market::MatrixKey;
pub use optimizer::AllocationOptimizer;
pub use refine::PairwiseRefiner;
pub use report::AllocationReport;
pub use report::AllocationRow;
pub use report::AssetSummary;
pub use report::asset_summaries;
pub use report::summaries_table;
pub use scorer::AllocationScorer;
pub use types::Allocation;
pub use types::OptimizationOutcome;
pub use types::RefineSummary;
pub use types::ScoreBreakdown;
pub use types::ScoredAllocation;
pub use types::SeedSummary;
pub use types::StopReason;
