//! Read-only HTTP surface over the world
//!
//! Provides:
//! - `GET /` HTML view of recent events and every reflection
//! - `GET /api/events` JSON feed of the latest events
//! - `GET /health` liveness check

pub mod page;
pub mod server;

pub use server::{ApiServer, EventView};
