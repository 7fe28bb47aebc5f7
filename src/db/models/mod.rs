//! Database record structures matching table schemas.

pub mod magic_tokens;
pub mod users;
