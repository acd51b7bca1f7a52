//! Conflict resolution: one policy applied to every node of a frozen graph.
//!
//! For a set of constraints:
//! - `Any` constraints are ignored when harder ones exist;
//! - exact versions must all agree, else the node is conflicting;
//! - ranges are intersected, an empty intersection is a conflict;
//! - an exact version must lie inside the range intersection;
//! - a range alone resolves to the highest known version inside it;
//! - `Any` alone resolves to the latest known version, or `local` / `bound`
//!   for project and service nodes.
//!
//! Unconditional requests decide the node's resolution. Conditional requests
//! are grouped by environment and resolved independently into `optional`;
//! they never produce conflicts.

use std::cmp::Ordering;

use polydep_core::dependency::{DependencyKind, Environment};
use polydep_core::events::{ConflictError, ErrorEvent, LookupUnavailable};
use polydep_core::manifest::{
    ConflictEntry, Contributor, OptionalDependency, Resolution, ResolvedManifest, ResolvedPackage,
    UnknownEntry,
};
use polydep_core::project::ProjectId;
use polydep_core::version::{PackageVersion, VersionConstraint, VersionRange};

use crate::graph::{DependencyGraph, DependencyNode, RequestedConstraint};
use crate::lookup::{LookupError, VersionLookup};

/// Resolution recorded for project nodes requested without a version.
pub const LOCAL: &str = "local";
/// Resolution recorded for service bindings requested without a version.
pub const BOUND: &str = "bound";

/// Resolve every dependency node of `graph` and build the manifest.
///
/// `projects` and discovery errors are left for the caller to fill in.
pub fn resolve(
    graph: &mut DependencyGraph,
    lookup: &dyn VersionLookup,
) -> miette::Result<ResolvedManifest> {
    let mut manifest = ResolvedManifest::default();

    for idx in graph.dependency_indices() {
        let Some(node) = graph.dependency(idx) else {
            continue;
        };

        let unconditional: Vec<&RequestedConstraint> = node.unconditional().collect();
        let node_resolution = if unconditional.is_empty() {
            None
        } else {
            let resolution = resolve_group(node, &unconditional, lookup, &mut manifest.errors);
            record_unconditional(&mut manifest, node, &unconditional, &resolution);
            Some(resolution)
        };

        for (environment, group) in environment_groups(node) {
            let resolution = resolve_group(node, &group, lookup, &mut manifest.errors);
            manifest.optional.push(OptionalDependency {
                package: node.name.clone(),
                kind: node.kind,
                environment,
                resolution,
                constraints: distinct_constraints(&group, false),
                contributing_projects: distinct_projects(&group),
            });
        }

        if let Some(resolution) = node_resolution {
            graph.set_resolution(idx, resolution)?;
        }
    }

    tracing::debug!(
        "resolved {} packages, {} conflicts, {} optional, {} unknown",
        manifest.packages.len(),
        manifest.conflicts.len(),
        manifest.optional.len(),
        manifest.unknown.len()
    );
    Ok(manifest)
}

fn record_unconditional(
    manifest: &mut ResolvedManifest,
    node: &DependencyNode,
    requests: &[&RequestedConstraint],
    resolution: &Resolution,
) {
    let key = node.manifest_key();
    match resolution {
        Resolution::Conflicting => {
            let hard: Vec<&RequestedConstraint> = requests
                .iter()
                .copied()
                .filter(|r| !r.constraint.is_any())
                .collect();
            let constraints = distinct_constraints(&hard, true);
            let projects = distinct_projects(&hard);
            tracing::debug!("{key}: conflicting constraints {}", constraints.join(", "));
            manifest.errors.push(ErrorEvent::from(ConflictError {
                package: key.clone(),
                constraints: constraints.clone(),
                projects: projects.clone(),
            }));
            manifest.conflicts.push(ConflictEntry {
                package: key.clone(),
                conflicting_constraints: constraints,
                contributing_projects: projects,
            });
        }
        Resolution::Unknown { reason } => manifest.unknown.push(UnknownEntry {
            package: key.clone(),
            reason: reason.clone(),
        }),
        Resolution::Resolved(_) => {}
    }

    manifest.packages.insert(
        key,
        ResolvedPackage {
            name: node.name.clone(),
            kind: node.kind,
            resolution: resolution.clone(),
            contributors: requests
                .iter()
                .map(|r| Contributor {
                    project: r.project.clone(),
                    constraint: r.constraint.to_string(),
                    provenance: r.provenance,
                })
                .collect(),
        },
    );
}

/// Conditional requests grouped by environment, in first-seen order.
fn environment_groups(node: &DependencyNode) -> Vec<(Environment, Vec<&RequestedConstraint>)> {
    let mut groups: Vec<(Environment, Vec<&RequestedConstraint>)> = Vec::new();
    for request in &node.requests {
        let Some(env) = &request.condition else {
            continue;
        };
        match groups.iter_mut().find(|(e, _)| e == env) {
            Some((_, group)) => group.push(request),
            None => groups.push((env.clone(), vec![request])),
        }
    }
    groups
}

/// Apply the policy, turning lookup failures into `Unknown` plus an event.
fn resolve_group(
    node: &DependencyNode,
    requests: &[&RequestedConstraint],
    lookup: &dyn VersionLookup,
    errors: &mut Vec<ErrorEvent>,
) -> Resolution {
    let constraints: Vec<&VersionConstraint> = requests.iter().map(|r| &r.constraint).collect();
    match apply_policy(&node.name, node.kind, &constraints, lookup) {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::warn!("{}: {e}", node.manifest_key());
            errors.push(ErrorEvent::from(LookupUnavailable {
                package: node.manifest_key(),
                reason: e.to_string(),
            }));
            Resolution::unknown(e.to_string())
        }
    }
}

/// The resolution policy for one set of constraints on one node.
pub fn apply_policy(
    name: &str,
    kind: DependencyKind,
    constraints: &[&VersionConstraint],
    lookup: &dyn VersionLookup,
) -> Result<Resolution, LookupError> {
    let mut exacts: Vec<&PackageVersion> = Vec::new();
    let mut ranges: Vec<&VersionRange> = Vec::new();
    for constraint in constraints {
        match constraint {
            VersionConstraint::Any => {}
            VersionConstraint::Exact(v) => exacts.push(v),
            VersionConstraint::Range(r) => ranges.push(r),
        }
    }

    if let Some((first, rest)) = exacts.split_first() {
        for other in rest {
            if lookup.compare_versions(&first.original, &other.original)? != Ordering::Equal {
                return Ok(Resolution::Conflicting);
            }
        }
    }

    let mut intersection: Option<VersionRange> = None;
    for range in ranges {
        intersection = match intersection {
            None => Some(range.clone()),
            Some(acc) => match acc.intersect(range) {
                Some(narrowed) => Some(narrowed),
                None => return Ok(Resolution::Conflicting),
            },
        };
    }

    match (exacts.first(), intersection) {
        (Some(exact), Some(range)) if range.contains(exact) => {
            Ok(Resolution::Resolved(exact.original.clone()))
        }
        (Some(_), Some(_)) => Ok(Resolution::Conflicting),
        (Some(exact), None) => Ok(Resolution::Resolved(exact.original.clone())),
        (None, Some(range)) => highest_in(name, &range, lookup),
        (None, None) => match kind {
            DependencyKind::Project => Ok(Resolution::Resolved(LOCAL.to_string())),
            DependencyKind::Service => Ok(Resolution::Resolved(BOUND.to_string())),
            _ => Ok(match lookup.latest_version(name)? {
                Some(latest) => Resolution::Resolved(latest),
                None => Resolution::unknown(format!("no version of {name} is known")),
            }),
        },
    }
}

/// Highest known version inside `range`; stable versions are preferred.
/// "Highest" is decided by the lookup's own ordering.
fn highest_in(
    name: &str,
    range: &VersionRange,
    lookup: &dyn VersionLookup,
) -> Result<Resolution, LookupError> {
    let candidates: Vec<PackageVersion> = lookup
        .known_versions(name)?
        .iter()
        .filter_map(|v| PackageVersion::parse(v).ok())
        .filter(|v| range.contains(v))
        .collect();

    let mut stable: Option<&PackageVersion> = None;
    let mut prerelease: Option<&PackageVersion> = None;
    for candidate in &candidates {
        let slot = if candidate.is_prerelease() {
            &mut prerelease
        } else {
            &mut stable
        };
        let higher = match slot {
            None => true,
            Some(current) => {
                lookup.compare_versions(&candidate.original, &current.original)? == Ordering::Greater
            }
        };
        if higher {
            *slot = Some(candidate);
        }
    }

    Ok(match stable.or(prerelease) {
        Some(v) => Resolution::Resolved(v.original.clone()),
        None => Resolution::unknown(format!("no known version of {name} satisfies {range}")),
    })
}

fn distinct_constraints(requests: &[&RequestedConstraint], hard_only: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in requests {
        if hard_only && r.constraint.is_any() {
            continue;
        }
        let rendered = r.constraint.to_string();
        if !out.contains(&rendered) {
            out.push(rendered);
        }
    }
    out
}

fn distinct_projects(requests: &[&RequestedConstraint]) -> Vec<ProjectId> {
    let mut out: Vec<ProjectId> = Vec::new();
    for r in requests {
        if !out.contains(&r.project) {
            out.push(r.project.clone());
        }
    }
    out
}
