//! Application layer services implementing business logic.
//!
//! Services consume the repository traits and give the HTTP handlers and the
//! admin CLI one API for every link operation.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Link creation, resolution and management
//! - [`services::code_allocator::CodeAllocator`] - Random and custom code assignment
//! - [`services::click_tracker::ClickTracker`] - Click fact construction and queueing

pub mod services;
