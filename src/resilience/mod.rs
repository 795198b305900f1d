//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a member or the master (probe, drain broadcast, registration):
//!     → retries.rs (bounded attempts, optional fixed or backoff delay)
//!     → backoff.rs (delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Proxied data-plane requests are never retried (at-most-once)
//! - Control-plane calls retry a small fixed number of times, then give up
//!   quietly; the periodic loop is the real retry mechanism
//! - Every network call has its own deadline

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{retry, retry_until};
