//! Default-handler resolution and assignment for the macOS type registry.
//!
//! The OS binding lives in `dutis-launchservices`; this crate holds
//! everything that can be reasoned about without it.

pub mod bundle;
pub mod config;
pub mod directory;
pub mod engine;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod names;
pub mod registry;
pub mod role;
pub mod uti;

use std::path::PathBuf;
use thiserror::Error;

pub use bundle::{resolve_application, BundleInfo, DocumentType};
pub use config::Settings;
pub use directory::{HandlerCandidate, HandlerDirectory, RetryPolicy};
pub use engine::{Assignment, AssignmentEngine, GroupEntry, OperationResult, RoleOutcome, RoleStatus};
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryRegistry;
pub use registry::{RankedHandler, Registry, RegistryError, TagClass, UNSET_HANDLER};
pub use role::{ConcreteRole, Role, RoleSet};
pub use uti::{TypeIdentifier, TypeKind};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to resolve {kind} '{input}' to a type identifier")]
    UnresolvedType { input: String, kind: TypeKind },
    #[error("invalid role: '{0}' (expected viewer, editor, shell, all, or a '+' combination)")]
    InvalidRole(String),
    #[error("'{application}' is not registered to handle {type_identifier} (use --force to assign it anyway)")]
    HandlerNotRegistered {
        type_identifier: TypeIdentifier,
        application: String,
    },
    #[error("registry rejected {operation}: {message} (status {status})")]
    RegistryRejected {
        operation: String,
        status: i32,
        message: String,
    },
    #[error("registry unavailable during {operation}: {message} (status {status})")]
    RegistryUnavailable {
        operation: String,
        status: i32,
        message: String,
    },
    #[error("{} of {} roles failed for {}", .0.failed_roles().len(), .0.roles.len(), .0.requested.type_identifier)]
    PartialFailure(Box<OperationResult>),
    #[error("configuration error in '{}': {message}", .path.display())]
    Config { path: PathBuf, message: String },
    #[error("invalid application bundle '{}': {message}", .path.display())]
    Bundle { path: PathBuf, message: String },
    #[error("unknown group: '{0}'")]
    UnknownGroup(String),
}

impl Error {
    /// Translate a registry failure into the engine's taxonomy.
    pub fn from_registry(operation: &str, err: RegistryError) -> Self {
        match err {
            RegistryError::Rejected { status, message } => Error::RegistryRejected {
                operation: operation.to_string(),
                status,
                message,
            },
            RegistryError::Unavailable { status, message } => Error::RegistryUnavailable {
                operation: operation.to_string(),
                status,
                message,
            },
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RegistryUnavailable { .. } => true,
            Error::PartialFailure(result) => result.roles.iter().any(|r| {
                matches!(r.status, RoleStatus::Failed { retryable: true, .. })
            }),
            _ => false,
        }
    }
}
