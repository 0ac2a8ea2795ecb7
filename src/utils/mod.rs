//! Helpers shared by the service and HTTP layers.
//!
//! - [`code_generator`] - Base62 code generation and lookup-key checks
//! - [`url_normalizer`] - Target URL validation and canonical form
//! - [`custom_code`] - Custom code rules and the fixed reserved list
//! - [`client_info`] - Client IP and tracking opt-out from request headers
//! - [`deadline`] - Timeouts around store calls
//! - [`db_error`] - Database error classification

pub mod client_info;
pub mod code_generator;
pub mod custom_code;
pub mod db_error;
pub mod deadline;
pub mod url_normalizer;
