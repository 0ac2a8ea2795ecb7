//! Core domain entities.
//!
//! # Entity Types
//!
//! - [`ShortLink`] - A code bound to a target URL with lifecycle flags
//! - [`ReservedCode`] - A code that cannot be claimed
//! - [`ClickFact`] - One recorded redirect
//!
//! Creation inputs live in separate `New*` structs; partial updates use
//! [`ShortLinkPatch`].

pub mod click;
pub mod link;
pub mod reserved_code;

pub use click::{ClickFact, UtmParams};
pub use link::{NewShortLink, ShortLink, ShortLinkPatch};
pub use reserved_code::{NewReservedCode, ReservedCode};
