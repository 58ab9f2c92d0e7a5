//! # ASMBTR Executor Crate
//!
//! This crate provides the components for simulated trade execution and account
//! state management. It defines a generic `Executor` trait, a `SimulatedExecutor`
//! for backtesting, and a single-position `Portfolio`.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The `Executor` is a pure calculator that
//!   determines the effects of a fill (slippage, quantity, commission) without
//!   mutating state. The `Portfolio` applies the resulting `Execution` to the
//!   balance and position.
//! - **One Position:** `Portfolio::open` refuses to open a second position, so the
//!   single-position invariant is enforced where the state lives.
//!
//! ## Public API
//!
//! - `Executor`: The core trait for all execution engines.
//! - `SimulatedExecutor`: The "virtual exchange" for backtesting.
//! - `Portfolio`: The in-memory account.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;
pub mod portfolio;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{Execution, Executor, FillAction, SimulatedExecutor};
pub use portfolio::Portfolio;
