//! Worker-side startup.
//!
//! # Data Flow
//! ```text
//! Listener bound, server running
//!     → advertise.rs (configured host, bound IP, or outbound interface)
//!     → registration.rs (POST /worker/register, fixed delay between attempts)
//!     → exhausted: process exits with status 1
//!
//! Drain started (any trigger)
//!     → registration.rs (POST /worker/deregister, master evicts this worker)
//! ```

pub mod advertise;
pub mod registration;

pub use advertise::{advertise_host, detect_external_ip};
pub use registration::{register_with_master, Deregistration, RegistrationError};
