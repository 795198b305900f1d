//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from master to worker and into every log line
//! - Metrics are cheap (atomic increments), safe to call with no recorder
//! - One "fleet reconciled" line per tick is the fleet's status report

pub mod logging;
pub mod metrics;
