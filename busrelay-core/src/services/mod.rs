//! Ambient services shared by the server and CLI

pub mod logging;
