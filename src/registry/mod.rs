//! Worker membership subsystem.
//!
//! # Data Flow
//! ```text
//! POST /worker/register {host, port}
//!     → address.rs (validate, canonical "host:port")
//!     → registry.rs (copy current membership, add to ring, swap in)
//!
//! Health loop eviction / drain
//!     → registry.rs (copy, remove from ring, swap in)
//!
//! Router
//!     → registry.rs load() (lock-free read of the current snapshot)
//! ```
//!
//! # Design Decisions
//! - Copy-on-write: a reader sees the old or the new membership, never a
//!   partially rebuilt ring
//! - Ring and entry table live in one snapshot so they never disagree
//! - Owned by the composition root and shared through `Arc`, not a global

pub mod address;
pub mod registry;

pub use address::{AddressError, WorkerAddr};
pub use registry::{Membership, RegistryEntry, WorkerRegistry};
