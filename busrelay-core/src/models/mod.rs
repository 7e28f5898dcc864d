//! Data models for busrelay

pub mod configuration;
pub mod connector;
pub mod request;

pub use configuration::*;
pub use connector::*;
pub use request::*;
