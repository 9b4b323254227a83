//! Data access for the tracker tables. Each sub-module owns one area and
//! exposes free async functions over a `DatabaseConnection` or transaction.

pub mod entry_service;
pub mod group_service;
pub mod widget_service;

pub use entry_service::*;
pub use group_service::*;
pub use widget_service::*;
