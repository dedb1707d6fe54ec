//! HTTP front door for the order service.
//!
//! The crate owns one thing of substance: the global CORS policy
//! ([`cors::CorsPolicy`]) and the middleware built from it. Everything else
//! is the bootstrap needed to serve it: configuration, the router with its
//! health endpoint, request ids and graceful shutdown.

pub mod config;
pub mod cors;
pub mod error;
pub mod middleware_impls;
pub mod routes;
pub mod server;
pub mod state;
