//! Plain-text and JSON rendering of engine results.

use anyhow::Result;
use dutis_core::names::friendly_name;
use dutis_core::{
    Assignment, BundleInfo, Error, GroupEntry, HandlerCandidate, OperationResult, RoleOutcome, RoleStatus,
    TypeIdentifier,
};
use serde::Serialize;
use std::collections::BTreeMap;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn heading(type_identifier: &TypeIdentifier) -> String {
    let name = friendly_name(type_identifier.as_str());
    if name == type_identifier.as_str() {
        type_identifier.to_string()
    } else {
        format!("{type_identifier} ({name})")
    }
}

fn role_line(outcome: &RoleOutcome) -> String {
    let handler = outcome.observed.as_deref().unwrap_or("(none)");
    match &outcome.status {
        RoleStatus::Read => match &outcome.hint {
            Some(hint) => format!("  {:<7} {handler}  [suggested: {hint}]", outcome.role.name()),
            None => format!("  {:<7} {handler}", outcome.role.name()),
        },
        RoleStatus::Committed => format!("  {:<7} {handler}", outcome.role.name()),
        RoleStatus::PendingVerification => {
            format!("  {:<7} {handler}  [pending: not reflected by the registry yet]", outcome.role.name())
        }
        RoleStatus::Failed {
            retryable,
            status,
            message,
        } => {
            let retry = if *retryable { ", retryable" } else { "" };
            format!("  {:<7} failed: {message} (status {status}{retry})", outcome.role.name())
        }
    }
}

pub fn operation(result: &OperationResult, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    println!("{}", heading(&result.requested.type_identifier));
    for outcome in &result.roles {
        println!("{}", role_line(outcome));
    }
    if result.is_divergent() {
        println!("note: roles have different handlers");
    }
    Ok(())
}

/// Report a `set` or `remove`; a partial failure is printed before it is
/// passed on as the command's error.
pub fn committed(result: dutis_core::Result<OperationResult>, json: bool) -> Result<()> {
    match result {
        Ok(result) => operation(&result, json),
        Err(Error::PartialFailure(result)) => {
            operation(&result, json)?;
            Err(Error::PartialFailure(result).into())
        }
        Err(err) => Err(err.into()),
    }
}

pub fn assignments(assignments: &[Assignment], json: bool) -> Result<()> {
    if json {
        return print_json(assignments);
    }
    if let Some(first) = assignments.first() {
        println!("{}", heading(&first.type_identifier));
    }
    for assignment in assignments {
        println!(
            "  {:<7} {}",
            assignment.role.to_string(),
            assignment.application_identifier.as_deref().unwrap_or("(none)")
        );
    }
    Ok(())
}

pub fn candidates(candidates: &[HandlerCandidate], json: bool) -> Result<()> {
    if json {
        return print_json(candidates);
    }
    if candidates.is_empty() {
        println!("no registered handlers");
    }
    for (position, candidate) in candidates.iter().enumerate() {
        let location = match candidate.bundle_locations.as_slice() {
            [] => "(not installed)".to_string(),
            [path] => path.display().to_string(),
            [path, rest @ ..] => format!("{} (+{} more)", path.display(), rest.len()),
        };
        println!("{:>3}. {:<40} {location}", position + 1, candidate.application_identifier);
    }
    Ok(())
}

pub fn groups(groups: &BTreeMap<String, Vec<String>>, json: bool) -> Result<()> {
    if json {
        return print_json(groups);
    }
    for (name, extensions) in groups {
        println!("{name}: {}", extensions.join(" "));
    }
    Ok(())
}

#[derive(Serialize)]
struct GroupReport<'a> {
    extension: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a OperationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Print every member of a group operation and return how many failed.
pub fn group_entries(entries: &[GroupEntry], json: bool) -> Result<usize> {
    let failed = entries.iter().filter(|e| e.result.is_err()).count();
    if json {
        let reports: Vec<GroupReport<'_>> = entries
            .iter()
            .map(|entry| match &entry.result {
                Ok(result) => GroupReport {
                    extension: &entry.input,
                    result: Some(result),
                    error: None,
                },
                Err(err) => GroupReport {
                    extension: &entry.input,
                    result: match err {
                        Error::PartialFailure(result) => Some(result.as_ref()),
                        _ => None,
                    },
                    error: Some(err.to_string()),
                },
            })
            .collect();
        print_json(&reports)?;
        return Ok(failed);
    }

    for entry in entries {
        match &entry.result {
            Ok(result) if result.verified => {
                println!("{:<8} {}", entry.input, result.requested.type_identifier)
            }
            Ok(result) => println!(
                "{:<8} {} (pending: {} roles not reflected yet)",
                entry.input,
                result.requested.type_identifier,
                result.pending_roles().len()
            ),
            Err(err) => println!("{:<8} failed: {err}", entry.input),
        }
    }
    println!("{} of {} extensions assigned", entries.len() - failed, entries.len());
    Ok(failed)
}

pub fn bundle(info: &BundleInfo, json: bool) -> Result<()> {
    if json {
        return print_json(info);
    }
    println!("identifier: {}", info.identifier);
    if let Some(name) = &info.name {
        println!("name:       {name}");
    }
    if let Some(version) = &info.version {
        println!("version:    {version}");
    }
    println!("path:       {}", info.path.display());

    let mut content_types: Vec<&str> = info
        .document_types
        .iter()
        .flat_map(|t| t.content_types.iter().map(String::as_str))
        .collect();
    content_types.sort_unstable();
    content_types.dedup();
    if !content_types.is_empty() {
        println!("types:");
        for uti in content_types {
            match friendly_name(uti) {
                name if name == uti => println!("  {uti}"),
                name => println!("  {uti} ({name})"),
            }
        }
    }
    let extensions = info.extensions();
    if !extensions.is_empty() {
        println!("extensions: {}", extensions.join(" "));
    }
    if !info.url_schemes.is_empty() {
        println!("schemes:    {}", info.url_schemes.join(" "));
    }
    Ok(())
}
