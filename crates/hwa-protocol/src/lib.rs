//! HWA Protocol - Wire protocol for daemon communication
//!
//! This crate provides the message types exchanged between the hwa
//! client and the hwad daemon: newline-delimited JSON, one request per
//! line, one reply per line.

pub mod message;
pub mod version;

pub use message::{Action, ErrorCode, Reply, Request, StatusEntry, Target};
pub use version::{ProtocolVersion, VersionError};
