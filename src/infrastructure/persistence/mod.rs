//! Repository implementations.
//!
//! # Repositories
//!
//! - [`PgLinkRepository`] - Links and reserved codes in PostgreSQL
//! - [`PgClickRepository`] - Click events and sharded counters in PostgreSQL
//! - [`MemoryLinkRepository`], [`MemoryClickRepository`] - In-process maps

pub mod memory;
pub mod pg_click_repository;
pub mod pg_link_repository;

pub use memory::{MemoryClickRepository, MemoryLinkRepository};
pub use pg_click_repository::PgClickRepository;
pub use pg_link_repository::PgLinkRepository;
