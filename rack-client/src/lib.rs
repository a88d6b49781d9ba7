//! Rack Client - typed boundary to the hosted auth + database backend
//!
//! The console and the admin service talk to the backend only through the
//! traits in [`backend`]. [`RestBackend`] and [`AdminClient`] speak the
//! hosted HTTP APIs; [`MemoryBackend`] (feature `memory`) keeps everything
//! in process for tests and offline demos.

pub mod backend;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod query;
pub mod realtime;
pub mod rest;
pub mod types;

pub use backend::{AdminBackend, AuthBackend, Backend, TableBackend};
pub use config::ClientConfig;
pub use error::{BackendError, BackendErrorKind, BackendResult};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryBackend;
pub use query::{Filter, Order, Query};
pub use rest::{AdminClient, RestBackend};
pub use types::{
    AdminUserAttributes, AuthEvent, AuthEventKind, AuthUser, ChangeEvent, ChangeKind, Session,
};
