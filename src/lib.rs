// Library root for config-relay

pub mod api;
pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod core;
pub mod metrics;
pub mod notify;
pub mod registration;
pub mod state;
