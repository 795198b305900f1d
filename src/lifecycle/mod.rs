//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Registry → Drain controller → Server → Health loop (master)
//!     Worker: bind → serve → register with master (exit 1 on failure)
//!
//! Drain (drain.rs):
//!     GET|POST /offline or SIGTERM/SIGINT
//!     → master only: tell every member to drain, evict it
//!     → refuse new data-plane requests (503)
//!     → poll inflight.rs until zero (or timeout)
//!     → shutdown.rs trigger → server stops → process exits 0
//!
//! Signals (signals.rs):
//!     First SIGTERM/SIGINT → drain
//!     Second → immediate shutdown
//! ```
//!
//! # Design Decisions
//! - A node never exits with requests in flight unless a drain timeout is set
//! - Shutdown is a watch channel so late subscribers still see it

pub mod drain;
pub mod inflight;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use drain::{DrainController, DrainOutcome, DrainState, FleetDrain};
pub use inflight::{InFlight, InFlightGuard};
pub use shutdown::{Shutdown, ShutdownSignal};
