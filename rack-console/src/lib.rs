//! Rack Console - session and data-cache core of the warehouse dashboard
//!
//! - [`session::SessionController`]: who is signed in, permission checks,
//!   visible navigation
//! - [`store::DataStore`]: cached collections with local-only fallback,
//!   kept fresh by [`store::RefreshWorker`]
//! - [`mirror::LocalMirror`]: JSON files surviving restarts

pub mod config;
pub mod logger;
pub mod mirror;
pub mod session;
pub mod store;
pub mod tasks;

pub use config::ConsoleConfig;
pub use mirror::{LocalMirror, MirrorError, MirrorKey, SessionMarker};
pub use session::{AuthPhase, NavigationRequest, SessionController, SessionOptions, SessionSnapshot};
pub use store::{Catalog, DataStore, RefreshOutcome, RefreshWorker, StoreError, WriteOutcome};
pub use tasks::{BackgroundTasks, TaskKind};
