//! An in-process [`Registry`] test double with fault injection.
//!
//! Behaves like Launch Services closely enough to drive the engine in tests:
//! unknown tags map to `dyn.` identifiers, handler lists keep insertion
//! order, and writes never register new candidates. Only built for tests
//! and with the `testing` feature.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::registry::{RankedHandler, Registry, RegistryError, TagClass};
use crate::role::ConcreteRole;
use crate::uti::{TypeIdentifier, DYNAMIC_PREFIX};

type Slot = (TypeIdentifier, ConcreteRole);

#[derive(Debug, Default)]
struct State {
    handlers: HashMap<Slot, Vec<String>>,
    defaults: HashMap<Slot, String>,
    bundles: HashMap<String, Vec<PathBuf>>,
    tags: HashMap<(TagClass, String), String>,
    rejected_roles: HashMap<ConcreteRole, i32>,
    failing_calls: usize,
    failing_status: i32,
    read_lag: usize,
    lagging: HashMap<Slot, (Option<String>, usize)>,
    ignored_writes: HashSet<ConcreteRole>,
    failing_bundles: HashMap<String, i32>,
    failing_reads_after_write: Option<i32>,
    writes: usize,
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: RefCell<State>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `application` as a candidate handler; later registrations
    /// rank lower.
    pub fn register(&self, uti: &str, role: ConcreteRole, application: &str) {
        self.register_type(TypeIdentifier::content_type(uti), role, application);
    }

    pub fn register_scheme(&self, scheme: &str, application: &str) {
        for role in ConcreteRole::ALL {
            self.register_type(TypeIdentifier::scheme(scheme), role, application);
        }
    }

    fn register_type(&self, type_identifier: TypeIdentifier, role: ConcreteRole, application: &str) {
        let mut state = self.state.borrow_mut();
        let list = state.handlers.entry((type_identifier, role)).or_default();
        if !list.iter().any(|a| a == application) {
            list.push(application.to_string());
        }
    }

    pub fn install(&self, application: &str, path: &str) {
        self.state
            .borrow_mut()
            .bundles
            .entry(application.to_string())
            .or_default()
            .push(PathBuf::from(path));
    }

    pub fn map_extension(&self, extension: &str, uti: &str) {
        self.state
            .borrow_mut()
            .tags
            .insert((TagClass::FilenameExtension, extension.to_string()), uti.to_string());
    }

    pub fn map_mime_type(&self, mime: &str, uti: &str) {
        self.state
            .borrow_mut()
            .tags
            .insert((TagClass::MimeType, mime.to_string()), uti.to_string());
    }

    /// Make every write for `role` fail with `status`.
    pub fn reject_writes(&self, role: ConcreteRole, status: i32) {
        self.state.borrow_mut().rejected_roles.insert(role, status);
    }

    /// Make writes for `role` succeed without changing anything.
    pub fn ignore_writes(&self, role: ConcreteRole) {
        self.state.borrow_mut().ignored_writes.insert(role);
    }

    /// Fail the next `count` calls of any kind with `status`.
    pub fn fail_next_calls(&self, count: usize, status: i32) {
        let mut state = self.state.borrow_mut();
        state.failing_calls = count;
        state.failing_status = status;
    }

    /// After each write, serve the previous value to the next `reads` reads
    /// of that slot.
    pub fn lag_reads(&self, reads: usize) {
        self.state.borrow_mut().read_lag = reads;
    }

    /// Make every bundle lookup for `application` fail with `status`.
    pub fn fail_locate(&self, application: &str, status: i32) {
        self.state
            .borrow_mut()
            .failing_bundles
            .insert(application.to_string(), status);
    }

    /// Once any write has landed, fail every default-handler read with
    /// `status`.
    pub fn fail_reads_after_write(&self, status: i32) {
        self.state.borrow_mut().failing_reads_after_write = Some(status);
    }

    /// The stored handler for a content-type slot, bypassing every fault.
    pub fn assigned(&self, uti: &str, role: ConcreteRole) -> Option<String> {
        self.state
            .borrow()
            .defaults
            .get(&(TypeIdentifier::content_type(uti), role))
            .cloned()
    }

    /// Number of writes that reached the registry.
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn handler_count(&self, uti: &str, role: ConcreteRole) -> usize {
        self.state
            .borrow()
            .handlers
            .get(&(TypeIdentifier::content_type(uti), role))
            .map_or(0, Vec::len)
    }

    fn injected_failure(&self) -> Result<(), RegistryError> {
        let mut state = self.state.borrow_mut();
        if state.failing_calls == 0 {
            return Ok(());
        }
        state.failing_calls -= 1;
        match RegistryError::from_status(state.failing_status) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Registry for MemoryRegistry {
    fn query_handlers(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
    ) -> Result<Vec<RankedHandler>, RegistryError> {
        self.injected_failure()?;
        let state = self.state.borrow();
        let handlers = state
            .handlers
            .get(&(type_identifier.clone(), role))
            .map(|list| {
                list.iter()
                    .enumerate()
                    .map(|(rank, id)| RankedHandler {
                        application_identifier: id.clone(),
                        rank: rank as u32,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(handlers)
    }

    fn default_handler(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
    ) -> Result<Option<String>, RegistryError> {
        self.injected_failure()?;
        let mut state = self.state.borrow_mut();
        if state.writes > 0 {
            if let Some(err) = state.failing_reads_after_write.and_then(RegistryError::from_status) {
                return Err(err);
            }
        }
        let slot = (type_identifier.clone(), role);
        if let Some((previous, remaining)) = state.lagging.get_mut(&slot) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(previous.clone());
            }
        }
        Ok(state.defaults.get(&slot).cloned())
    }

    fn set_handler(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
        application_identifier: &str,
    ) -> Result<(), RegistryError> {
        self.injected_failure()?;
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.rejected_roles.get(&role).copied() {
            if let Some(err) = RegistryError::from_status(status) {
                return Err(err);
            }
        }
        state.writes += 1;
        if state.ignored_writes.contains(&role) {
            return Ok(());
        }
        let slot = (type_identifier.clone(), role);
        let previous = state.defaults.insert(slot.clone(), application_identifier.to_string());
        let lag = state.read_lag;
        if lag > 0 {
            state.lagging.insert(slot, (previous, lag));
        }
        Ok(())
    }

    fn locate_bundle(&self, application_identifier: &str) -> Result<Vec<PathBuf>, RegistryError> {
        self.injected_failure()?;
        let failing = self.state.borrow().failing_bundles.get(application_identifier).copied();
        if let Some(err) = failing.and_then(RegistryError::from_status) {
            return Err(err);
        }
        Ok(self
            .state
            .borrow()
            .bundles
            .get(application_identifier)
            .cloned()
            .unwrap_or_default())
    }

    fn preferred_identifier(&self, class: TagClass, tag: &str) -> Result<Option<String>, RegistryError> {
        self.injected_failure()?;
        let state = self.state.borrow();
        let mapped = state
            .tags
            .get(&(class, tag.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("{DYNAMIC_PREFIX}{}", tag.replace(['/', '.'], "-")));
        Ok(Some(mapped))
    }
}
