//! Client for the worker-fleet control plane.

pub mod client;

pub use client::{FleetClient, FleetState, RegisterRequest, SdkError, WorkerInfo};
