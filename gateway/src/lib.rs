//! Trex panel gateway library
//!
//! Authenticated access to the panel backend, the server-side route guard
//! for the panel frontend, and display helpers shared by both.

pub mod client;
pub mod config;
pub mod format;
pub mod guard;

pub use client::{ApiClient, ClientError};
pub use config::{ConfigError, GatewayConfig};
pub use guard::GuardState;
