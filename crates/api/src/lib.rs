//! HTTP API: routing, the request Gate, and request/response mapping.

pub mod app;
pub mod authz;
pub mod config;
pub mod middleware;
