//! The assignment engine.
//!
//! One invocation runs one pass of
//! `Normalizing -> Resolving -> Reading -> Committing -> Verifying -> Done`
//! (or `Failed`). Nothing is cached between passes: every read goes to the
//! registry. Writes are provisional until a read-back confirms them, and
//! multi-role writes are not transactional, so results are reported per
//! concrete role.

use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;

use crate::config::Settings;
use crate::directory::{HandlerCandidate, HandlerDirectory, RetryPolicy};
use crate::registry::{Registry, RegistryError, UNSET_HANDLER};
use crate::role::{resolve_assignment_targets, ConcreteRole, RoleSet};
use crate::uti::{self, TypeIdentifier, TypeKind};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Normalizing,
    Resolving,
    Reading,
    Committing,
    Verifying,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Normalizing => "normalizing",
            Phase::Resolving => "resolving",
            Phase::Reading => "reading",
            Phase::Committing => "committing",
            Phase::Verifying => "verifying",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A (type, roles) slot and the application that does or should handle it.
/// `None` means no handler is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    #[serde(rename = "type")]
    pub type_identifier: TypeIdentifier,
    pub role: RoleSet,
    pub application_identifier: Option<String>,
}

/// Where a single concrete role stands after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RoleStatus {
    /// Read only; nothing was written.
    Read,
    /// Written and confirmed by a read-back.
    Committed,
    /// The registry accepted the write but the read-back still differs.
    PendingVerification,
    /// The write failed; the slot was left as it was.
    Failed {
        retryable: bool,
        #[serde(rename = "code")]
        status: i32,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleOutcome {
    pub role: ConcreteRole,
    #[serde(flatten)]
    pub status: RoleStatus,
    /// Handler the registry reported for this role.
    pub observed: Option<String>,
    /// Top-ranked candidate, shown when nothing is assigned. Never committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// The outcome of `get`, `set` or `remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub requested: Assignment,
    /// Present when every role read back the same handler.
    pub observed: Option<Assignment>,
    pub verified: bool,
    pub roles: Vec<RoleOutcome>,
}

impl OperationResult {
    /// Roles disagree on their current handler.
    pub fn is_divergent(&self) -> bool {
        let mut observed = self.roles.iter().map(|r| &r.observed);
        match observed.next() {
            Some(first) => observed.any(|o| o != first),
            None => false,
        }
    }

    pub fn failed_roles(&self) -> Vec<ConcreteRole> {
        self.roles
            .iter()
            .filter(|r| matches!(r.status, RoleStatus::Failed { .. }))
            .map(|r| r.role)
            .collect()
    }

    pub fn pending_roles(&self) -> Vec<ConcreteRole> {
        self.roles
            .iter()
            .filter(|r| r.status == RoleStatus::PendingVerification)
            .map(|r| r.role)
            .collect()
    }

    fn from_roles(requested: Assignment, roles: Vec<RoleOutcome>) -> Self {
        let verified = roles
            .iter()
            .all(|r| matches!(r.status, RoleStatus::Read | RoleStatus::Committed));
        let agreed = roles
            .iter()
            .filter(|r| !matches!(r.status, RoleStatus::Failed { .. }))
            .map(|r| &r.observed)
            .collect::<Vec<_>>();
        let observed = match agreed.first() {
            Some(first) if agreed.len() == roles.len() && agreed.iter().all(|o| o == first) => Some(Assignment {
                type_identifier: requested.type_identifier.clone(),
                role: requested.role,
                application_identifier: (*first).clone(),
            }),
            _ => None,
        };
        OperationResult {
            requested,
            observed,
            verified,
            roles,
        }
    }
}

/// One member of a group operation.
#[derive(Debug)]
pub struct GroupEntry {
    pub input: String,
    pub result: Result<OperationResult>,
}

pub struct AssignmentEngine<'a> {
    directory: HandlerDirectory<'a>,
    verify_attempts: usize,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(registry: &'a dyn Registry, settings: &Settings) -> Self {
        AssignmentEngine {
            directory: HandlerDirectory::new(registry, settings.retry_policy()),
            verify_attempts: settings.verify_attempts,
        }
    }

    pub fn with_directory(directory: HandlerDirectory<'a>, verify_attempts: usize) -> Self {
        AssignmentEngine {
            directory,
            verify_attempts,
        }
    }

    pub fn directory(&self) -> &HandlerDirectory<'a> {
        &self.directory
    }

    pub fn normalize(&self, input: &str, kind: TypeKind) -> Result<TypeIdentifier> {
        trace_phase(Phase::Normalizing, input);
        uti::normalize(&self.directory, input, kind).inspect_err(|_| trace_phase(Phase::Failed, input))
    }

    pub fn candidates(&self, type_identifier: &TypeIdentifier, roles: RoleSet) -> Result<Vec<HandlerCandidate>> {
        self.directory.candidates(type_identifier, roles)
    }

    /// Read the current handler of every concrete role in `roles`.
    ///
    /// Disagreeing roles are reported individually; `observed` is only set
    /// when they all agree.
    pub fn get(&self, type_identifier: &TypeIdentifier, roles: RoleSet) -> Result<OperationResult> {
        let label = type_identifier.to_string();
        trace_phase(Phase::Resolving, &label);
        let targets = resolve_assignment_targets(type_identifier, roles);

        trace_phase(Phase::Reading, &label);
        let mut outcomes = Vec::with_capacity(targets.len());
        for (target, role) in &targets {
            let observed = self.directory.current(target, *role)?;
            let hint = match observed {
                Some(_) => None,
                None => self
                    .directory
                    .registered_identifiers(target, (*role).into())?
                    .into_iter()
                    .next(),
            };
            outcomes.push(RoleOutcome {
                role: *role,
                status: RoleStatus::Read,
                observed,
                hint,
            });
        }

        let requested = Assignment {
            type_identifier: type_identifier.clone(),
            role: roles,
            application_identifier: None,
        };
        let result = OperationResult::from_roles(requested, outcomes);
        if result.is_divergent() {
            info!("event=divergent_roles type={type_identifier} roles={roles}");
        }
        trace_phase(Phase::Done, &label);
        Ok(result)
    }

    /// Assign `application_identifier` to every concrete role in `roles`.
    ///
    /// Unless `force` is set the application must already be registered
    /// for the type. A write that the registry accepts but a read-back does
    /// not reflect is reported as pending verification, not as an error. If
    /// some roles fail while others commit, the result comes back inside
    /// [`Error::PartialFailure`]; committed roles are not rolled back.
    pub fn set(
        &self,
        type_identifier: &TypeIdentifier,
        roles: RoleSet,
        application_identifier: &str,
        force: bool,
    ) -> Result<OperationResult> {
        let label = type_identifier.to_string();
        trace_phase(Phase::Resolving, &label);
        let application_identifier = application_identifier.trim();
        if application_identifier.is_empty() || application_identifier == UNSET_HANDLER {
            return Err(Error::HandlerNotRegistered {
                type_identifier: type_identifier.clone(),
                application: application_identifier.to_string(),
            });
        }

        trace_phase(Phase::Reading, &label);
        let registered = self
            .directory
            .registered_identifiers(type_identifier, roles)?
            .iter()
            .any(|id| id == application_identifier);
        if !registered {
            if !force {
                trace_phase(Phase::Failed, &label);
                return Err(Error::HandlerNotRegistered {
                    type_identifier: type_identifier.clone(),
                    application: application_identifier.to_string(),
                });
            }
            warn!("event=force_unregistered type={type_identifier} app={application_identifier}");
        }

        self.commit(type_identifier, roles, Some(application_identifier))
    }

    /// Clear every concrete role in `roles` by writing the unset sentinel.
    pub fn remove(&self, type_identifier: &TypeIdentifier, roles: RoleSet) -> Result<OperationResult> {
        trace_phase(Phase::Resolving, &type_identifier.to_string());
        self.commit(type_identifier, roles, None)
    }

    /// The current assignment of each concrete role, viewer first.
    pub fn list(&self, type_identifier: &TypeIdentifier) -> Result<Vec<Assignment>> {
        let mut assignments = Vec::with_capacity(ConcreteRole::ALL.len());
        for role in ConcreteRole::ALL {
            let result = self.get(type_identifier, role.into())?;
            let application_identifier = result.roles.into_iter().next().and_then(|r| r.observed);
            assignments.push(Assignment {
                type_identifier: type_identifier.clone(),
                role: role.into(),
                application_identifier,
            });
        }
        Ok(assignments)
    }

    /// Applications registered for every type in `types`, ordered as for
    /// the first type.
    pub fn common_candidates(&self, types: &[TypeIdentifier], roles: RoleSet) -> Result<Vec<String>> {
        let mut common: Option<Vec<String>> = None;
        for type_identifier in types {
            let ids = self.directory.registered_identifiers(type_identifier, roles)?;
            common = Some(match common {
                None => ids,
                Some(mut existing) => {
                    existing.retain(|id| ids.contains(id));
                    existing
                }
            });
        }
        Ok(common.unwrap_or_default())
    }

    /// Assign one application to each extension in a group.
    ///
    /// Every extension is handled independently: one that fails to
    /// normalize or to commit does not stop the rest.
    pub fn set_group(
        &self,
        extensions: &[String],
        roles: RoleSet,
        application_identifier: &str,
        force: bool,
    ) -> Vec<GroupEntry> {
        extensions
            .iter()
            .map(|extension| {
                let result = self
                    .normalize(extension, TypeKind::Extension)
                    .and_then(|ty| self.set(&ty, roles, application_identifier, force));
                if let Err(err) = &result {
                    warn!("event=group_member_failed extension={extension} error=\"{err}\"");
                }
                GroupEntry {
                    input: extension.clone(),
                    result,
                }
            })
            .collect()
    }

    fn commit(
        &self,
        type_identifier: &TypeIdentifier,
        roles: RoleSet,
        target: Option<&str>,
    ) -> Result<OperationResult> {
        let label = type_identifier.to_string();
        let value = target.unwrap_or(UNSET_HANDLER);
        let targets = resolve_assignment_targets(type_identifier, roles);

        trace_phase(Phase::Committing, &label);
        let mut written: Vec<ConcreteRole> = Vec::new();
        let mut failures: Vec<(ConcreteRole, RegistryError)> = Vec::new();
        for (slot, role) in &targets {
            match self.directory.write(slot, *role, value) {
                Ok(()) => {
                    debug!("event=write type={type_identifier} role={role} app={value}");
                    written.push(*role);
                }
                Err(err) => {
                    warn!(
                        "event=write_failed type={type_identifier} role={role} status={} retryable={}",
                        err.status(),
                        err.is_retryable()
                    );
                    failures.push((*role, err));
                }
            }
        }

        if written.is_empty() && !failures.is_empty() {
            trace_phase(Phase::Failed, &label);
            let (_, err) = failures.swap_remove(0);
            return Err(Error::from_registry("set_handler", err));
        }

        trace_phase(Phase::Verifying, &label);
        let mut outcomes = Vec::with_capacity(targets.len());
        for (slot, role) in &targets {
            if let Some((_, err)) = failures.iter().find(|(r, _)| r == role) {
                outcomes.push(RoleOutcome {
                    role: *role,
                    status: RoleStatus::Failed {
                        retryable: err.is_retryable(),
                        status: err.status(),
                        message: err.message().to_string(),
                    },
                    observed: self.directory.current(slot, *role).ok().flatten(),
                    hint: None,
                });
                continue;
            }
            // The write already landed; an unreadable slot stays provisional.
            let (status, observed) = match self.verify(slot, *role, target) {
                Ok(observed) if observed.as_deref() == target => (RoleStatus::Committed, observed),
                Ok(observed) => {
                    warn!(
                        "event=verification_mismatch type={type_identifier} role={role} expected={} observed={}",
                        value,
                        observed.as_deref().unwrap_or("none")
                    );
                    (RoleStatus::PendingVerification, observed)
                }
                Err(err) => {
                    warn!("event=verification_unreadable type={type_identifier} role={role} error=\"{err}\"");
                    (RoleStatus::PendingVerification, None)
                }
            };
            outcomes.push(RoleOutcome {
                role: *role,
                status,
                observed,
                hint: None,
            });
        }

        let requested = Assignment {
            type_identifier: type_identifier.clone(),
            role: roles,
            application_identifier: target.map(str::to_string),
        };
        let result = OperationResult::from_roles(requested, outcomes);
        if !failures.is_empty() {
            trace_phase(Phase::Failed, &label);
            return Err(Error::PartialFailure(Box::new(result)));
        }
        trace_phase(Phase::Done, &label);
        Ok(result)
    }

    /// Read a slot back, re-reading with backoff while it still differs.
    fn verify(&self, slot: &TypeIdentifier, role: ConcreteRole, expected: Option<&str>) -> Result<Option<String>> {
        let policy = RetryPolicy {
            attempts: self.verify_attempts + 1,
            ..*self.directory.policy()
        };
        let mut delays = policy.backoff();
        loop {
            let observed = self.directory.current(slot, role)?;
            if observed.as_deref() == expected {
                return Ok(observed);
            }
            match delays.next() {
                Some(delay) => {
                    debug!("event=verify_retry type={slot} role={role} delay_ms={}", delay.as_millis());
                    self.directory.pause(delay);
                }
                None => return Ok(observed),
            }
        }
    }
}

fn trace_phase(phase: Phase, subject: &str) {
    debug!("event=phase phase={phase} subject={subject}");
}
