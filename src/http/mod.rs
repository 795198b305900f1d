//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace)
//!     → middleware.rs (in-flight tracking, 503 while draining)
//!     → handlers.rs
//!         /health, /offline              every node
//!         /worker/register, /worker/deregister,
//!         /worker/state                  master only
//!         anything else                  master: dispatch to ring owner
//!                                        worker: local data plane
//! ```

pub mod handlers;
pub mod local;
pub mod middleware;
pub mod server;

pub use handlers::{DEREGISTER_PATH, HEALTH_PATH, REGISTER_PATH, STATE_PATH};
pub use server::{AppState, FleetServer};
