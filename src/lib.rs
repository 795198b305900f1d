//! Self-managing fleet of request-handling workers behind one master.

pub mod config;
pub mod http;
pub mod proxy;
pub mod registry;
pub mod ring;
pub mod worker;

pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::FleetConfig;
pub use http::FleetServer;
pub use lifecycle::startup::{run, Node, StartupError};
pub use lifecycle::Shutdown;
