//! Repository trait definitions for the domain layer.
//!
//! # Architecture
//!
//! - Traits define the contract for data operations
//! - Implementations live in `crate::infrastructure::persistence`
//! - Mock implementations are auto-generated via `mockall` for testing
//!
//! # Available Repositories
//!
//! - [`LinkRepository`] - Short links and reserved codes
//! - [`ClickRepository`] - Click facts and sharded counters

pub mod click_repository;
pub mod link_repository;

pub use click_repository::{COUNTER_SHARDS, ClickRepository};
pub use link_repository::LinkRepository;

#[cfg(test)]
pub use click_repository::MockClickRepository;
#[cfg(test)]
pub use link_repository::MockLinkRepository;
