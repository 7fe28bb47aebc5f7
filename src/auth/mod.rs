//! Passwordless authentication: magic-link issuance/redemption, JWT sessions,
//! request extractors, and the throttles guarding the issuance endpoint.

pub mod cooldown;
pub mod current_user;
pub mod magic_link;
pub mod rate_limit;
pub mod session;
pub mod token;
