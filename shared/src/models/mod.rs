//! Data models
//!
//! Row types mirror the hosted tables (`products`, `racks`, `rack_products`,
//! `categories`, `product_codes`, `users`, `activity_logs`). Create/Update
//! payloads use the same column names. Every cached record is keyed by an
//! [`EntityKey`] so locally-created placeholders cannot be mistaken for
//! backend rows.

pub mod category;
pub mod entity_key;
pub mod page;
pub mod permission;
pub mod product;
pub mod product_code;
pub mod rack;
pub mod role;
pub mod serde_helpers;
pub mod stock_movement;
pub mod user;

// Re-exports
pub use category::*;
pub use entity_key::*;
pub use page::*;
pub use permission::*;
pub use product::*;
pub use product_code::*;
pub use rack::*;
pub use role::*;
pub use stock_movement::*;
pub use user::*;
