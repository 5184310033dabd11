//! # ats-client
//!
//! Worker-side client for the automation server.
//!
//! Resolves the session/process a worker runs under, claims work items one at
//! a time from a server-managed workqueue, reports their status back, and
//! ships tracing events to the server's audit log tagged with the work item
//! currently being processed.

pub mod active;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod server;
pub mod telemetry;

pub use active::ActiveWorkItem;
pub use client::Client;
pub use client::workqueue::WorkItems;
pub use config::Config;
pub use error::{Error, Result};
pub use server::AutomationServer;
