//! Docket Core - Shared functionality for Docket tools
//!
//! Administrative core for a county criminal-justice document system.

pub mod directory;
pub mod fs;
pub mod paths;

pub use directory::{
    Court, CourtDetails, Directory, DirectoryError, DocumentRepository, FieldType, MetadataField,
    RepositoryDetails, User, UserProfile, UserStatus,
};
pub use paths::Paths;
