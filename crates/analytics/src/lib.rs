//! # ASMBTR Analytics Engine
//!
//! This crate provides the tools for conducting quantitative analysis of backtest
//! performance. It acts as the "unbiased judge" of the system.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** The `AnalyticsEngine` is a stateless calculator. It takes
//!   trades and the equity curve as input and produces `BacktestMetrics` as output.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `BacktestMetrics`: The flat record of all performance metrics.
//! - `EquityTracker`: Running peak and drawdown bookkeeping for equity sampling.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod equity;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{AnalyticsEngine, ANNUALIZATION_PERIODS};
pub use equity::{drawdown, EquityTracker};
pub use error::AnalyticsError;
pub use report::BacktestMetrics;
