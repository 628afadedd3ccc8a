//! HWA Client - one-shot requests to the hwad arbiter daemon
//!
//! This crate provides the `Client` used by the `hwa` binary: connect
//! to the daemon's Unix socket, send one newline-delimited JSON request,
//! read one reply line.

pub mod client;

pub use client::{Client, ClientError};
