//! Client side of the external compilation service.
//!
//! [`CompilationBridge`] is the seam the sync pipeline depends on;
//! [`ServiceClient`] implements it over newline-delimited JSON, matching every
//! response to its request by correlation id.

mod bridge;
mod client;
pub mod endpoint;
mod error;
pub mod protocol;

pub use bridge::CompilationBridge;
pub use client::ServiceClient;
pub use endpoint::ServiceEndpoint;
pub use error::BridgeError;
pub use protocol::{Method, ServiceRequest, ServiceResponse};
