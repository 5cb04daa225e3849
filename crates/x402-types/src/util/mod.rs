//! Helper types.
//!
//! - [`b64`] - Base64 encoding/decoding of header payloads
//! - [`money_amount`] - Human-readable currency amount parsing

pub mod b64;
pub mod money_amount;

pub use b64::*;
