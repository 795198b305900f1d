//! Consistent hashing subsystem.
//!
//! # Data Flow
//! ```text
//! Membership change (register / evict)
//!     → ring.rs (insert or drop `virtual_nodes` positions per member)
//!     → sorted position index rebuilt
//!
//! Routing key (host / client ip)
//!     → hash.rs (32-bit string hash)
//!     → ring.rs (binary search for first position ≥ hash, wrap to start)
//!     → owning member
//! ```
//!
//! # Design Decisions
//! - Many virtual positions per member so a join/leave moves ~1/N of keys
//! - Hash is deterministic across restarts; no per-process seed
//! - The ring itself is a plain value; sharing and atomic replacement are
//!   the registry's job

pub mod hash;
pub mod ring;

pub use hash::hash_key;
pub use ring::{HashRing, RingStats};
