//! Request/response types exposed by the HTTP API.

pub mod auth;
pub mod users;
