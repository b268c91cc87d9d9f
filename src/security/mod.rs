//! Request input hardening.
//!
//! - [`injection`]: blacklist scan of request-derived values for HTML tag
//!   openings commonly used in XSS payloads.

pub mod injection;

pub use injection::{check_parameters, check_value, is_suspicious};
