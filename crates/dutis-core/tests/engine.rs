use dutis_core::registry::{LS_CANNOT_SET_INFO_ERR, LS_SERVER_COMMUNICATION_ERR, LS_UNKNOWN_ERR};
use dutis_core::{
    AssignmentEngine, ConcreteRole, Error, HandlerDirectory, MemoryRegistry, Role, RoleSet, RoleStatus, RetryPolicy,
    TypeIdentifier, TypeKind,
};

fn no_sleep(_: std::time::Duration) {}

fn engine(registry: &MemoryRegistry) -> AssignmentEngine<'_> {
    let directory = HandlerDirectory::new(registry, RetryPolicy::immediate(3)).with_sleep(no_sleep);
    AssignmentEngine::with_directory(directory, 1)
}

fn browsers() -> MemoryRegistry {
    let registry = MemoryRegistry::new();
    registry.map_extension("html", "public.html");
    for role in ConcreteRole::ALL {
        registry.register("public.html", role, "com.apple.Safari");
        registry.register("public.html", role, "org.mozilla.firefox");
    }
    registry.install("com.apple.Safari", "/Applications/Safari.app");
    registry.install("org.mozilla.firefox", "/Applications/Firefox.app");
    registry
}

fn html(engine: &AssignmentEngine<'_>) -> TypeIdentifier {
    engine.normalize("public.html", TypeKind::Uti).unwrap()
}

#[test]
fn test_set_then_get_round_trip() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.set(&ty, Role::Viewer.into(), "org.mozilla.firefox", false).unwrap();
    assert!(result.verified);
    assert_eq!(result.roles[0].status, RoleStatus::Committed);

    let got = engine.get(&ty, Role::Viewer.into()).unwrap();
    let observed = got.observed.unwrap();
    assert_eq!(observed.application_identifier.as_deref(), Some("org.mozilla.firefox"));
}

#[test]
fn test_set_is_idempotent() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    let first = engine.set(&ty, Role::Editor.into(), "com.apple.Safari", false).unwrap();
    let second = engine.set(&ty, Role::Editor.into(), "com.apple.Safari", false).unwrap();
    assert!(first.verified && second.verified);
    assert_eq!(first.observed, second.observed);
    assert_eq!(registry.handler_count("public.html", ConcreteRole::Editor), 2);
}

#[test]
fn test_set_all_applies_to_every_role() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.set(&ty, RoleSet::ALL, "org.mozilla.firefox", false).unwrap();
    assert_eq!(result.roles.len(), 3);
    assert!(result.verified);
    for role in ConcreteRole::ALL {
        let got = engine.get(&ty, role.into()).unwrap();
        assert_eq!(got.roles[0].observed.as_deref(), Some("org.mozilla.firefox"), "{role}");
    }
}

#[test]
fn test_partial_failure_is_reported_per_role() {
    let registry = browsers();
    registry.reject_writes(ConcreteRole::Shell, LS_CANNOT_SET_INFO_ERR);
    let engine = engine(&registry);
    let ty = html(&engine);

    let err = engine.set(&ty, RoleSet::ALL, "org.mozilla.firefox", false).unwrap_err();
    let result = match err {
        Error::PartialFailure(result) => result,
        other => panic!("expected partial failure, got {other}"),
    };
    assert_eq!(result.failed_roles(), vec![ConcreteRole::Shell]);
    assert!(!result.verified);
    assert!(result.observed.is_none());
    assert!(matches!(
        result.roles[2].status,
        RoleStatus::Failed { retryable: false, status: LS_CANNOT_SET_INFO_ERR, .. }
    ));

    // Committed roles are kept; the failed role is untouched.
    assert_eq!(
        engine.get(&ty, Role::Viewer.into()).unwrap().roles[0].observed.as_deref(),
        Some("org.mozilla.firefox")
    );
    assert_ne!(
        engine.get(&ty, Role::Shell.into()).unwrap().roles[0].observed.as_deref(),
        Some("org.mozilla.firefox")
    );
}

#[test]
fn test_single_role_rejection_is_not_partial() {
    let registry = browsers();
    registry.reject_writes(ConcreteRole::Viewer, LS_CANNOT_SET_INFO_ERR);
    let engine = engine(&registry);
    let ty = html(&engine);

    let err = engine.set(&ty, Role::Viewer.into(), "com.apple.Safari", false).unwrap_err();
    assert!(matches!(err, Error::RegistryRejected { status: LS_CANNOT_SET_INFO_ERR, .. }));
    assert!(!err.is_retryable());
}

#[test]
fn test_unregistered_handler_requires_force() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    let err = engine.set(&ty, Role::Viewer.into(), "com.nonexistent.app", false).unwrap_err();
    assert!(matches!(err, Error::HandlerNotRegistered { .. }));
    assert_eq!(registry.writes(), 0);

    let result = engine.set(&ty, Role::Viewer.into(), "com.nonexistent.app", true).unwrap();
    assert!(result.verified);
    let got = engine.get(&ty, Role::Viewer.into()).unwrap();
    assert_eq!(got.roles[0].observed.as_deref(), Some("com.nonexistent.app"));
    assert!(engine.directory().locate("com.nonexistent.app").unwrap().is_empty());
}

#[test]
fn test_lagging_read_back_is_pending_not_failed() {
    let registry = browsers();
    registry.lag_reads(5);
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.set(&ty, Role::Viewer.into(), "com.apple.Safari", false).unwrap();
    assert!(!result.verified);
    assert_eq!(result.pending_roles(), vec![ConcreteRole::Viewer]);
}

#[test]
fn test_one_verification_retry_absorbs_lag() {
    let registry = browsers();
    registry.lag_reads(1);
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.set(&ty, Role::Viewer.into(), "com.apple.Safari", false).unwrap();
    assert!(result.verified);
}

#[test]
fn test_write_accepted_but_ignored() {
    let registry = browsers();
    registry.ignore_writes(ConcreteRole::Editor);
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.set(&ty, "viewer+editor".parse().unwrap(), "com.apple.Safari", false).unwrap();
    assert!(!result.verified);
    assert_eq!(result.pending_roles(), vec![ConcreteRole::Editor]);
    assert_eq!(result.roles[0].status, RoleStatus::Committed);
}

#[test]
fn test_transient_unavailability_is_retried() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    registry.fail_next_calls(2, LS_SERVER_COMMUNICATION_ERR);
    let result = engine.set(&ty, Role::Shell.into(), "com.apple.Safari", false).unwrap();
    assert!(result.verified);

    registry.fail_next_calls(10, LS_SERVER_COMMUNICATION_ERR);
    let err = engine.get(&ty, Role::Shell.into()).unwrap_err();
    assert!(matches!(err, Error::RegistryUnavailable { .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_get_reports_divergent_roles() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    engine.set(&ty, Role::Viewer.into(), "com.apple.Safari", false).unwrap();
    engine.set(&ty, "editor+shell".parse().unwrap(), "org.mozilla.firefox", false).unwrap();

    let result = engine.get(&ty, RoleSet::ALL).unwrap();
    assert!(result.is_divergent());
    assert!(result.observed.is_none());
    let observed: Vec<Option<&str>> = result.roles.iter().map(|r| r.observed.as_deref()).collect();
    assert_eq!(
        observed,
        vec![Some("com.apple.Safari"), Some("org.mozilla.firefox"), Some("org.mozilla.firefox")]
    );
}

#[test]
fn test_get_without_assignment_offers_hint_only() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.get(&ty, Role::Viewer.into()).unwrap();
    assert_eq!(result.roles[0].observed, None);
    assert_eq!(result.roles[0].hint.as_deref(), Some("com.apple.Safari"));
    assert_eq!(registry.writes(), 0);
}

#[test]
fn test_remove_clears_roles() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    engine.set(&ty, RoleSet::ALL, "com.apple.Safari", false).unwrap();
    let result = engine.remove(&ty, RoleSet::ALL).unwrap();
    assert!(result.verified);
    assert_eq!(result.observed.unwrap().application_identifier, None);

    let assignments = engine.list(&ty).unwrap();
    assert_eq!(assignments.len(), 3);
    assert!(assignments.iter().all(|a| a.application_identifier.is_none()));
}

#[test]
fn test_list_composes_get_per_role() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    engine.set(&ty, Role::Editor.into(), "org.mozilla.firefox", false).unwrap();
    let assignments = engine.list(&ty).unwrap();
    let roles: Vec<String> = assignments.iter().map(|a| a.role.to_string()).collect();
    assert_eq!(roles, vec!["viewer", "editor", "shell"]);
    assert_eq!(assignments[0].application_identifier, None);
    assert_eq!(assignments[1].application_identifier.as_deref(), Some("org.mozilla.firefox"));
}

#[test]
fn test_url_scheme_assignment() {
    let registry = MemoryRegistry::new();
    registry.register_scheme("https", "com.apple.Safari");
    let engine = engine(&registry);
    let ty = engine.normalize("https://", TypeKind::UrlScheme).unwrap();

    let result = engine.set(&ty, RoleSet::ALL, "com.apple.Safari", false).unwrap();
    assert!(result.verified);
    assert_eq!(result.requested.type_identifier.to_string(), "https://");
}

#[test]
fn test_unknown_extension_is_rejected() {
    let registry = browsers();
    let engine = engine(&registry);
    assert!(matches!(
        engine.normalize(".zzzqux", TypeKind::Extension),
        Err(Error::UnresolvedType { .. })
    ));
}

#[test]
fn test_group_assignment_skips_unresolvable_members() {
    let registry = browsers();
    registry.map_extension("htm", "public.html");
    let engine = engine(&registry);

    let extensions = vec!["html".to_string(), "zzzqux".to_string(), "htm".to_string()];
    let entries = engine.set_group(&extensions, Role::Viewer.into(), "com.apple.Safari", false);
    assert_eq!(entries.len(), 3);
    assert!(entries[0].result.is_ok());
    assert!(matches!(entries[1].result, Err(Error::UnresolvedType { .. })));
    assert!(entries[2].result.is_ok());
}

#[test]
fn test_common_candidates() {
    let registry = browsers();
    registry.register("public.png", ConcreteRole::Viewer, "com.apple.Preview");
    registry.register("public.png", ConcreteRole::Viewer, "com.apple.Safari");
    let engine = engine(&registry);

    let types = vec![
        engine.normalize("public.html", TypeKind::Uti).unwrap(),
        engine.normalize("public.png", TypeKind::Uti).unwrap(),
    ];
    let common = engine.common_candidates(&types, Role::Viewer.into()).unwrap();
    assert_eq!(common, vec!["com.apple.Safari"]);
}

#[test]
fn test_results_serialize_per_role() {
    let registry = browsers();
    registry.reject_writes(ConcreteRole::Editor, LS_CANNOT_SET_INFO_ERR);
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = match engine.set(&ty, RoleSet::ALL, "com.apple.Safari", false) {
        Err(Error::PartialFailure(result)) => result,
        other => panic!("expected partial failure, got {other:?}"),
    };
    let json = serde_json::to_value(&*result).unwrap();
    assert_eq!(json["requested"]["type"], "public.html");
    assert_eq!(json["requested"]["role"], "all");
    assert_eq!(json["roles"][0]["status"], "committed");
    assert_eq!(json["roles"][1]["status"], "failed");
    assert_eq!(json["roles"][1]["retryable"], false);
    assert_eq!(json["roles"][1]["code"], LS_CANNOT_SET_INFO_ERR);
}

#[test]
fn test_candidate_order_is_stable() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);

    let first = engine.candidates(&ty, Role::Viewer.into()).unwrap();
    let second = engine.candidates(&ty, Role::Viewer.into()).unwrap();
    assert_eq!(first, second);
    let ids: Vec<&str> = first.iter().map(|c| c.application_identifier.as_str()).collect();
    assert_eq!(ids, vec!["com.apple.Safari", "org.mozilla.firefox"]);
    assert_eq!(first[0].bundle_locations, vec![std::path::PathBuf::from("/Applications/Safari.app")]);
}

#[test]
fn test_unreadable_slot_after_write_is_pending() {
    let registry = browsers();
    registry.fail_reads_after_write(LS_SERVER_COMMUNICATION_ERR);
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = engine.set(&ty, RoleSet::ALL, "org.mozilla.firefox", false).unwrap();
    assert!(!result.verified);
    assert_eq!(result.pending_roles(), ConcreteRole::ALL.to_vec());
    assert!(result.roles.iter().all(|r| r.observed.is_none()));
    assert_eq!(registry.writes(), 3);
    for role in ConcreteRole::ALL {
        assert_eq!(registry.assigned("public.html", role).as_deref(), Some("org.mozilla.firefox"));
    }
}

#[test]
fn test_unreadable_slot_is_reported_next_to_failed_role() {
    let registry = browsers();
    registry.reject_writes(ConcreteRole::Editor, LS_CANNOT_SET_INFO_ERR);
    registry.fail_reads_after_write(LS_SERVER_COMMUNICATION_ERR);
    let engine = engine(&registry);
    let ty = html(&engine);

    let result = match engine.set(&ty, RoleSet::ALL, "com.apple.Safari", false) {
        Err(Error::PartialFailure(result)) => result,
        other => panic!("expected partial failure, got {other:?}"),
    };
    assert_eq!(result.failed_roles(), vec![ConcreteRole::Editor]);
    assert_eq!(result.pending_roles(), vec![ConcreteRole::Viewer, ConcreteRole::Shell]);
}

#[test]
fn test_remove_reports_partial_failure() {
    let registry = browsers();
    let engine = engine(&registry);
    let ty = html(&engine);
    engine.set(&ty, RoleSet::ALL, "com.apple.Safari", false).unwrap();

    registry.reject_writes(ConcreteRole::Shell, LS_CANNOT_SET_INFO_ERR);
    let result = match engine.remove(&ty, RoleSet::ALL) {
        Err(Error::PartialFailure(result)) => result,
        other => panic!("expected partial failure, got {other:?}"),
    };
    assert_eq!(result.failed_roles(), vec![ConcreteRole::Shell]);
    assert_eq!(result.roles[0].status, RoleStatus::Committed);
    assert_eq!(result.roles[1].status, RoleStatus::Committed);
    assert_eq!(result.roles[2].observed.as_deref(), Some("com.apple.Safari"));

    let assignments = engine.list(&ty).unwrap();
    assert_eq!(assignments[0].application_identifier, None);
    assert_eq!(assignments[2].application_identifier.as_deref(), Some("com.apple.Safari"));
}

#[test]
fn test_set_and_get_do_not_need_bundle_locations() {
    let registry = browsers();
    registry.fail_locate("com.apple.Safari", LS_UNKNOWN_ERR);
    let engine = engine(&registry);
    let ty = html(&engine);

    let got = engine.get(&ty, Role::Viewer.into()).unwrap();
    assert_eq!(got.roles[0].hint.as_deref(), Some("com.apple.Safari"));

    let result = engine.set(&ty, RoleSet::ALL, "org.mozilla.firefox", false).unwrap();
    assert!(result.verified);

    // Listing candidates with their locations still surfaces the failure.
    let err = engine.candidates(&ty, RoleSet::ALL).unwrap_err();
    assert!(matches!(err, Error::RegistryRejected { status: LS_UNKNOWN_ERR, .. }));
}
