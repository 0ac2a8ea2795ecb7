//! Business logic services for the application layer.

pub mod click_tracker;
pub mod code_allocator;
pub mod link_service;

pub use click_tracker::{ClickPolicy, ClickTracker, TrackOutcome};
pub use code_allocator::CodeAllocator;
pub use link_service::{CodeAvailability, CreateLink, LinkInfo, LinkService, UpdateLink};
