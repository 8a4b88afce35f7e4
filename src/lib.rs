// ABOUTME: Library root for mushak - exposes the deployment engine for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod classify;
pub mod compose;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod layout;
pub mod naming;
pub mod output;
pub mod ports;
pub mod proxy;
pub mod registry;
pub mod runtime;
pub mod shutdown;
pub mod source;
pub mod types;
