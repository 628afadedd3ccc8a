//! HWA Daemon - Exclusive hardware arbiter
//!
//! This crate provides the core infrastructure for the hwad daemon:
//! - `executor` - Actor owning the hardware adapter and status cache
//! - `server` - Unix socket server with single-client arbitration
//! - `monitor` - Background edge monitors for interrupt-driven inputs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       hwad daemon                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  DaemonServer   │────▶│      ExecutorActor          │   │
//! │  │ (Unix socket,   │     │ (adapter + status cache,    │   │
//! │  │  Semaphore(1))  │     │  single bus serializer)     │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │ one locked client           │ bus transactions │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │      HardwareAdapter        │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                         ▲                   │
//! │  ┌─────────────────┐  wait_for_edge     │                   │
//! │  │  Edge monitors  │────────────────────┘                   │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod executor;
pub mod monitor;
pub mod server;
