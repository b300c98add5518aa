//! luft-daemon library target.
//!
//! Exposes the router, shared state and poll task wiring for integration
//! tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod poll;
pub mod routes;
pub mod state;
