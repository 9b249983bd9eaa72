//! Common utilities and shared types for forum-rs.
//!
//! This crate provides foundational components used across all forum-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Metrics**: Vote and content counters via [`Metrics`]
//! - **Pagination**: Offset pages for listings via [`PageRequest`] and [`Page`]
//!
//! # Example
//!
//! ```no_run
//! use forum_common::{AppResult, Config, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {} (pool size {})", id, config.database.max_connections);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;
pub mod pagination;

pub use config::{Config, DatabaseConfig, ListingConfig, VotingConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use metrics::{Metrics, MetricsSnapshot, Timer, VoteTransitionKind, get_metrics};
pub use pagination::{Page, PageRequest, Pagination, ResolvedPage};
