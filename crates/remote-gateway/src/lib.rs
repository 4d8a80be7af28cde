//! # Remote Gateway
//!
//! Outbound port to the hosted backend-as-a-service.
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Module Structure
//!
//! ```text
//! remote-gateway/
//! ├── ports/      # RemoteGateway trait, Filter, ChangeFeed
//! ├── adapters/   # InMemoryGateway (tests, demo runtime)
//! └── errors.rs   # GatewayError
//! ```
//!
//! Production deployments implement `RemoteGateway` over the vendor SDK;
//! nothing else in the workspace talks to the backend directly.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod errors;
pub mod ports;

pub use adapters::{FunctionHandler, InMemoryGateway};
pub use errors::GatewayError;
pub use ports::{ChangeFeed, Filter, GatewayOp, Predicate, RemoteGateway};
