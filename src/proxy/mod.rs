//! Request router (master data plane).
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → key.rs (Host header / client IP)
//!     → registry lookup (owning worker, or none)
//!     → forward.rs (rewrite URI, stream body, return worker response)
//!     → 502 if the worker cannot be reached
//!
//! No member owns the key (empty ring)
//!     → served by the master's own local handler
//! ```

pub mod forward;
pub mod key;

pub use forward::{build_client, forward, HttpClient, ProxyError, X_REQUEST_ID};
pub use key::routing_key;
