//! Health and autoscale subsystem (master only).
//!
//! # Data Flow
//! ```text
//! Timer (monitor.rs), one tick after the previous finished:
//!     → client.rs probe every member (bounded attempts, per-probe timeout)
//!     → evict members that failed
//!     → while live > expected: evict a random member, ask it to drain
//!     → for live..expected: spawner.rs launches a worker
//!
//! New worker
//!     → POST /worker/register on the master
//!     → joins the ring (the monitor never registers it)
//! ```
//!
//! # Design Decisions
//! - Member calls and process launches sit behind traits so the loop can
//!   be driven without a network or child processes
//! - Probe failures must persist for `failure_threshold` ticks before eviction

pub mod client;
pub mod monitor;
pub mod spawner;

pub use client::{HttpMemberClient, MemberClient, OFFLINE_PATH};
pub use monitor::{HealthMonitor, TickReport};
pub use spawner::{ProcessSpawner, SpawnError, Spawner};
