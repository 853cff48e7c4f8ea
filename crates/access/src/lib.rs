//! Docket Access - who may do what, where
//!
//! Permissions are a sparse table keyed by user, module and (for court-foldered
//! modules) court. Each row carries the full view/create/edit/delete set; a
//! missing row means no access at all.
//!
//! Which modules are court-scoped is configuration, handed to every store
//! call through a [`ModuleCatalog`].

pub mod audit;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod matrix;
pub mod record;
pub mod store;

pub use audit::{AuditEntry, AuditLog, AuditQuery, ChangeKind};
pub use backend::{JsonFileBackend, MemoryBackend, PermissionBackend};
pub use catalog::{Module, ModuleCatalog};
pub use config::AccessConfig;
pub use error::{AccessError, PersistError};
pub use matrix::{AccessMatrix, MatrixEntry};
pub use record::{AccessFlags, Action, PermissionRecord};
pub use store::PermissionStore;
