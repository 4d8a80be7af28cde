//! # Adapters Module

pub mod memory;

pub use memory::{FunctionHandler, InMemoryGateway, FEED_CAPACITY};
