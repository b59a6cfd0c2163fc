//! # Sortino Allocator
//!
//! Long-only portfolio allocation that maximises a downside-risk adjusted
//! return against a required rate of return.

pub mod config;
pub mod error;
pub mod portfolio;

pub use config::AllocatorConfig;
pub use config::MarketConfig;
pub use config::RefineConfig;
pub use config::SeedConfig;
pub use error::AllocationError;
pub use error::Result;
