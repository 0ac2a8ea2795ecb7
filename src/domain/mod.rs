//! Domain layer containing business entities and logic.
//!
//! Entities and repository contracts here have no dependency on the HTTP or
//! storage layers.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`click_context`] - Client metadata captured at redirect time
//! - [`click_worker`] - Background click recording
//!
//! # Click Processing Flow
//!
//! 1. The redirect handler builds a [`click_context::ClickContext`]
//! 2. [`crate::application::services::ClickTracker`] turns it into a
//!    [`entities::ClickFact`] and sends it to a bounded channel
//! 3. [`click_worker::run_click_worker`] persists facts with retry logic
//! 4. Facts land in [`repositories::ClickRepository`]

pub mod click_context;
pub mod click_worker;
pub mod entities;
pub mod repositories;
