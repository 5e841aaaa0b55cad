//! # Gatewatch Gateway
//! Subscription CRUD over HTTP, guarded by a shared secret.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
