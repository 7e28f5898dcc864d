//! # Busrelay Core Library
//!
//! Message-publishing relay: connector configuration persistence, message bus
//! transports, size-bounded batching and the relay service tying them together.

pub mod batch;
pub mod bus;
pub mod error;
pub mod models;
pub mod server;
pub mod service;
pub mod services;
pub mod store;

pub use error::{RelayError, RelayResult};
pub use service::RelayService;
