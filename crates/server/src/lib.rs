//! HTTP REST API server for the tender recommendation service.
//!
//! Exposes the recommendation core over JSON:
//!
//! - **Recommendations**: ranked, explained tender matches per company
//!   profile, with cursorless pagination and hard filters
//! - **Similar tenders**: nearest-neighbor lookup by reference tender
//! - **Feedback**: interaction recording with idempotent dedup, plus
//!   per-user stats
//! - **Profile**: company matching-profile reads, partial updates, and
//!   option enumerations
//! - **Health & metrics**: liveness/readiness probes and Prometheus output
//!
//! # Features
//!
//! - API-key authentication resolving to a per-request identity
//! - Fixed-window rate limiting and load shedding with `Retry-After`
//! - Request-id tracking, structured request logs, compression, CORS
//! - Environment + file based configuration
//! - Graceful shutdown on SIGTERM/Ctrl+C
//!
//! # Quick start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::{AuthContext, ServerState};
