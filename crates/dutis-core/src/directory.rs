//! Read-only queries against the registry, with bounded retry of transient
//! failures.

use backon::{BackoffBuilder, ExponentialBuilder};
use log::{debug, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::registry::{Registry, RegistryError, TagClass, UNSET_HANDLER};
use crate::role::{ConcreteRole, RoleSet};
use crate::uti::TypeIdentifier;
use crate::{Error, Result};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How many times a registry call is attempted while it reports itself
/// unavailable, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            min_delay: Duration::from_millis(100),
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits between attempts.
    pub fn immediate(attempts: usize) -> Self {
        RetryPolicy {
            attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delays to sleep before each retry; yields `attempts - 1` values.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay.max(self.min_delay))
            .with_factor(2.0)
            .with_max_times(self.attempts.saturating_sub(1))
            .build()
    }
}

/// A registered application for a type, as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerCandidate {
    pub application_identifier: String,
    pub bundle_locations: Vec<PathBuf>,
    pub rank: u32,
}

/// Stateless query surface over a [`Registry`].
pub struct HandlerDirectory<'a> {
    registry: &'a dyn Registry,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<'a> HandlerDirectory<'a> {
    pub fn new(registry: &'a dyn Registry, policy: RetryPolicy) -> Self {
        HandlerDirectory {
            registry,
            policy,
            sleep: thread::sleep,
        }
    }

    /// Replace the function used to wait between retries.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub(crate) fn pause(&self, delay: Duration) {
        (self.sleep)(delay);
    }

    /// Run a registry call, retrying while it reports itself unavailable.
    pub(crate) fn call<T>(
        &self,
        operation: &str,
        mut f: impl FnMut(&dyn Registry) -> std::result::Result<T, RegistryError>,
    ) -> std::result::Result<T, RegistryError> {
        let mut delays = self.policy.backoff();
        loop {
            match f(self.registry) {
                Err(err) if err.is_retryable() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            "event=registry_retry op={operation} status={} delay_ms={}",
                            err.status(),
                            delay.as_millis()
                        );
                        self.pause(delay);
                    }
                    None => return Err(err),
                },
                other => return other,
            }
        }
    }

    /// Identifiers registered for the type under any role in `roles`, most
    /// preferred first. Bundle locations are not looked up.
    pub fn registered_identifiers(&self, type_identifier: &TypeIdentifier, roles: RoleSet) -> Result<Vec<String>> {
        Ok(self
            .ranked(type_identifier, roles)?
            .into_iter()
            .map(|(application_identifier, _)| application_identifier)
            .collect())
    }

    /// Applications registered for the type under any role in `roles`.
    ///
    /// Ranks come from the registry; candidates sharing a rank keep the
    /// order the registry reported them in. Each candidate's bundle
    /// locations are resolved fresh.
    pub fn candidates(&self, type_identifier: &TypeIdentifier, roles: RoleSet) -> Result<Vec<HandlerCandidate>> {
        let merged = self.ranked(type_identifier, roles)?;
        let mut candidates = Vec::with_capacity(merged.len());
        for (application_identifier, rank) in merged {
            let bundle_locations = self.locate(&application_identifier)?;
            candidates.push(HandlerCandidate {
                application_identifier,
                bundle_locations,
                rank,
            });
        }
        debug!(
            "event=candidates type={type_identifier} roles={roles} count={}",
            candidates.len()
        );
        Ok(candidates)
    }

    fn ranked(&self, type_identifier: &TypeIdentifier, roles: RoleSet) -> Result<Vec<(String, u32)>> {
        let mut merged: Vec<(String, u32)> = Vec::new();
        for role in roles.iter() {
            let handlers = self
                .call("query_handlers", |r| r.query_handlers(type_identifier, role))
                .map_err(|e| Error::from_registry("query_handlers", e))?;
            for handler in handlers {
                match merged.iter_mut().find(|(id, _)| *id == handler.application_identifier) {
                    Some(existing) => existing.1 = existing.1.min(handler.rank),
                    None => merged.push((handler.application_identifier, handler.rank)),
                }
            }
        }
        // Stable: equal ranks stay in registry order.
        merged.sort_by_key(|(_, rank)| *rank);
        Ok(merged)
    }

    /// Installed locations of an application. Empty is not an error.
    pub fn locate(&self, application_identifier: &str) -> Result<Vec<PathBuf>> {
        self.call("locate_bundle", |r| r.locate_bundle(application_identifier))
            .map_err(|e| Error::from_registry("locate_bundle", e))
    }

    /// The committed handler for one slot; the unset sentinel reads as `None`.
    pub fn current(&self, type_identifier: &TypeIdentifier, role: ConcreteRole) -> Result<Option<String>> {
        let handler = self
            .call("default_handler", |r| r.default_handler(type_identifier, role))
            .map_err(|e| Error::from_registry("default_handler", e))?;
        Ok(handler.filter(|id| !id.is_empty() && id != UNSET_HANDLER))
    }

    pub fn preferred_identifier(&self, class: TagClass, tag: &str) -> Result<Option<String>> {
        self.call("preferred_identifier", |r| r.preferred_identifier(class, tag))
            .map_err(|e| Error::from_registry("preferred_identifier", e))
    }

    /// Commit a handler for one slot. Not part of the read-only surface; the
    /// engine is the only caller.
    pub(crate) fn write(
        &self,
        type_identifier: &TypeIdentifier,
        role: ConcreteRole,
        application_identifier: &str,
    ) -> std::result::Result<(), RegistryError> {
        self.call("set_handler", |r| {
            r.set_handler(type_identifier, role, application_identifier)
        })
    }
}
