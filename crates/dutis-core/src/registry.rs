//! The contract an OS type-handler registry must satisfy.
//!
//! Implementations perform the privileged reads and writes and classify OS
//! status codes with [`RegistryError::from_status`]; the engine converts
//! those into [`crate::Error`] so no raw status escapes it.

use std::fmt;
use std::path::PathBuf;

use crate::role::ConcreteRole;
use crate::uti::TypeIdentifier;

/// Handler identifier written by `remove`; reads returning it mean "unset".
pub const UNSET_HANDLER: &str = "-";

// Launch Services result codes (LSInfo.h / MacErrors.h).
pub const LS_UNKNOWN_ERR: i32 = -10810;
pub const LS_DATA_UNAVAILABLE_ERR: i32 = -10813;
pub const LS_APPLICATION_NOT_FOUND_ERR: i32 = -10814;
pub const LS_DATA_TOO_OLD_ERR: i32 = -10816;
pub const LS_LAUNCH_IN_PROGRESS_ERR: i32 = -10818;
pub const LS_SERVER_COMMUNICATION_ERR: i32 = -10822;
pub const LS_CANNOT_SET_INFO_ERR: i32 = -10823;
pub const ERR_AE_TIMEOUT: i32 = -1712;
pub const UNIMP_ERR: i32 = -4;

/// Tag classes understood by the type mapping tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    FilenameExtension,
    MimeType,
}

impl TagClass {
    /// The `kUTTagClass*` constant value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TagClass::FilenameExtension => "public.filename-extension",
            TagClass::MimeType => "public.mime-type",
        }
    }
}

/// One entry of a registry handler query, in OS-reported order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedHandler {
    pub application_identifier: String,
    /// Lower is more preferred.
    pub rank: u32,
}

/// A registry call failure, already classified by retryability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The OS refused the request (permissions, bad arguments, ...).
    Rejected { status: i32, message: String },
    /// The OS was busy or timed out; the same call may succeed later.
    Unavailable { status: i32, message: String },
}

impl RegistryError {
    /// Classify a non-zero OS status. Returns `None` for `noErr`.
    pub fn from_status(status: i32) -> Option<Self> {
        if status == 0 {
            return None;
        }
        let message = describe_status(status).to_string();
        if is_transient_status(status) {
            Some(RegistryError::Unavailable { status, message })
        } else {
            Some(RegistryError::Rejected { status, message })
        }
    }

    pub fn status(&self) -> i32 {
        match self {
            RegistryError::Rejected { status, .. } | RegistryError::Unavailable { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RegistryError::Rejected { message, .. } | RegistryError::Unavailable { message, .. } => message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Unavailable { .. })
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message(), self.status())
    }
}

impl std::error::Error for RegistryError {}

fn is_transient_status(status: i32) -> bool {
    matches!(
        status,
        LS_DATA_UNAVAILABLE_ERR
            | LS_DATA_TOO_OLD_ERR
            | LS_LAUNCH_IN_PROGRESS_ERR
            | LS_SERVER_COMMUNICATION_ERR
            | ERR_AE_TIMEOUT
    )
}

fn describe_status(status: i32) -> &'static str {
    match status {
        LS_UNKNOWN_ERR => "unknown Launch Services error",
        LS_DATA_UNAVAILABLE_ERR => "registry data unavailable",
        LS_APPLICATION_NOT_FOUND_ERR => "application not found",
        LS_DATA_TOO_OLD_ERR => "registry data too old",
        LS_LAUNCH_IN_PROGRESS_ERR => "registry busy",
        LS_SERVER_COMMUNICATION_ERR => "cannot communicate with the Launch Services server",
        LS_CANNOT_SET_INFO_ERR => "registry refused the change",
        ERR_AE_TIMEOUT => "registry call timed out",
        UNIMP_ERR => "Launch Services is not available on this platform",
        -54 | -5000 => "permission denied",
        -50 => "invalid parameter",
        _ => "registry error",
    }
}

/// Read/write access to the OS type-handler registry.
///
/// Every call is authoritative only for the instant it runs: the registry
/// is shared with other processes and the OS itself.
pub trait Registry {
    /// Every application registered for `type_identifier` under `role`,
    /// most preferred first.
    fn query_handlers(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
    ) -> Result<Vec<RankedHandler>, RegistryError>;

    /// The currently committed handler for the slot, if any.
    fn default_handler(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
    ) -> Result<Option<String>, RegistryError>;

    /// Commit `application_identifier` as the handler for the slot.
    fn set_handler(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
        application_identifier: &str,
    ) -> Result<(), RegistryError>;

    /// Installed bundle locations; empty when the identifier is not installed.
    fn locate_bundle(&self, application_identifier: &str) -> Result<Vec<PathBuf>, RegistryError>;

    /// Map an extension or MIME type to the OS's preferred UTI.
    fn preferred_identifier(&self, class: TagClass, tag: &str) -> Result<Option<String>, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_error_status() {
        assert_eq!(RegistryError::from_status(0), None);
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        for status in [LS_SERVER_COMMUNICATION_ERR, LS_DATA_UNAVAILABLE_ERR, ERR_AE_TIMEOUT] {
            let err = RegistryError::from_status(status).unwrap();
            assert!(err.is_retryable(), "{status}");
        }
    }

    #[test]
    fn test_other_statuses_are_rejections() {
        let err = RegistryError::from_status(LS_CANNOT_SET_INFO_ERR).unwrap();
        assert!(!err.is_retryable());
        assert_eq!(err.status(), LS_CANNOT_SET_INFO_ERR);
        assert_eq!(err.to_string(), "registry refused the change (status -10823)");

        let err = RegistryError::from_status(-12345).unwrap();
        assert!(matches!(err, RegistryError::Rejected { .. }));
    }
}
