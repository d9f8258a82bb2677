pub mod auth;
pub mod permissions;
pub mod session;
