//! Core of burrow: expose a locally supervised process through a public
//! tunnel endpoint.
//!
//! The pieces are independent and communicate over channels: a
//! [`supervisor::Supervisor`] runs the child command, a [`watcher::Watcher`]
//! reports debounced filesystem activity, a [`tunnel::Tunnel`] holds the
//! public lease and its connection pool, and a [`proxy::Proxy`] answers the
//! tunneled requests. The `burrow` binary wires them into an event loop.

pub mod config;
pub mod error;
pub mod logging;
pub mod logs;
pub mod proxy;
pub mod shutdown;
pub mod supervisor;
pub mod tunnel;
pub mod watcher;

pub use error::{Error, Result};
