//! Repository implementations for database tables.

pub mod magic_tokens;
pub mod repository;
pub mod users;

pub use magic_tokens::MagicTokens;
pub use repository::Repository;
pub use users::Users;
