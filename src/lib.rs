//! Edgelord - event-driven arbitrage detection and execution engine for
//! binary prediction markets.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # The engine: bus, domain types, and every stage
//! │   ├── bus/          # Glob-pattern pub/sub event bus
//! │   ├── domain/       # Pure domain types (ids, money, orders, positions, ...)
//! │   ├── exchange/     # Exchange ports + the Polymarket adapter
//! │   ├── market_data/  # Order book maintenance and staleness detection
//! │   ├── strategy/     # Detection algorithms
//! │   ├── risk/         # Exposure caps, daily loss limit, circuit breaker
//! │   ├── execution/    # Priority queue, worker pool, dual-leg execution
//! │   ├── settlement/   # Claim queue with backoff retries
//! │   ├── store/        # State store contract, in-memory and SQLite
//! │   └── metrics/      # Prometheus-backed metrics registry
//! └── app/              # Configuration loading and component wiring
//!
//! src/cli/              # `edgelord run|status|config show`
//! ```

pub mod app;
pub mod cli;
pub mod core;
pub mod error;
