//! # Ports Module
//!
//! The outbound port the store depends on, and the filter vocabulary it
//! speaks.

pub mod filter;
pub mod gateway;

pub use filter::*;
pub use gateway::*;
