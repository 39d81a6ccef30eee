use std::path::PathBuf;

use dutis_core::registry::UNIMP_ERR;
use dutis_core::{ConcreteRole, RankedHandler, Registry, RegistryError, TagClass, TypeIdentifier};
use log::debug;

#[derive(Debug, Default)]
pub struct LaunchServices;

impl LaunchServices {
    pub fn new() -> Self {
        LaunchServices
    }

    fn unsupported<T>(&self, operation: &str) -> Result<T, RegistryError> {
        debug!("event=registry_unsupported operation={operation}");
        Err(RegistryError::Rejected {
            status: UNIMP_ERR,
            message: "Launch Services is not available on this platform".to_string(),
        })
    }
}

impl Registry for LaunchServices {
    fn query_handlers(&self, _: &TypeIdentifier, _: ConcreteRole) -> Result<Vec<RankedHandler>, RegistryError> {
        self.unsupported("query_handlers")
    }

    fn default_handler(&self, _: &TypeIdentifier, _: ConcreteRole) -> Result<Option<String>, RegistryError> {
        self.unsupported("default_handler")
    }

    fn set_handler(&self, _: &TypeIdentifier, _: ConcreteRole, _: &str) -> Result<(), RegistryError> {
        self.unsupported("set_handler")
    }

    fn locate_bundle(&self, _: &str) -> Result<Vec<PathBuf>, RegistryError> {
        self.unsupported("locate_bundle")
    }

    fn preferred_identifier(&self, _: TagClass, _: &str) -> Result<Option<String>, RegistryError> {
        self.unsupported("preferred_identifier")
    }
}
