//! sharevault - self-hosted file storage with capability links
//!
//! The crate keeps a per-user virtual directory tree over an object store
//! and issues scoped, expiring, optionally password-protected share links.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod sanitize;
pub mod share;
pub mod storage;
pub mod tree;

pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{Result, VaultError};
pub use sanitize::{sanitize_filename, sanitize_path, validate_no_traversal, SanitizeError};
pub use share::{
    AccessRequest, PermissionType, ResourceRef, ResourceType, Share, ShareAction, ShareRequest,
    ShareService, SharedResource, ValidatedShare,
};
pub use storage::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use tree::{
    Breadcrumb, CascadeReport, DeleteReport, Directory, DirectoryTree, FileEntry, Listing,
    Mutation, UploadRequest,
};
