//! Usage scanner: reads source files for imports, owned namespaces and
//! service registration calls, and infers undeclared dependencies from them.

pub mod infer;
pub mod lexer;
pub mod registration;
pub mod source;

use polydep_core::dependency::{
    DeclaredDependency, DependencyKind, Environment, Provenance, SourceLocation,
};
use polydep_core::project::Language;
use polydep_core::version::VersionConstraint;

use source::{imports_on_line, is_within, namespace_on_line, ImportRef};

/// A service registration call with its file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCall {
    pub call: &'static str,
    pub service: &'static str,
    pub location: SourceLocation,
    pub condition: Option<Environment>,
}

/// Everything the scanner found in one project's sources, in file then line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageScan {
    pub imports: Vec<ImportRef>,
    pub namespaces: Vec<String>,
    pub registrations: Vec<ServiceCall>,
}

impl UsageScan {
    pub fn merge(&mut self, other: UsageScan) {
        self.imports.extend(other.imports);
        for ns in other.namespaces {
            if !self.namespaces.iter().any(|n| n.eq_ignore_ascii_case(&ns)) {
                self.namespaces.push(ns);
            }
        }
        self.registrations.extend(other.registrations);
    }

    /// Whether `namespace` is declared by this project's own sources.
    pub fn owns(&self, namespace: &str) -> bool {
        self.namespaces.iter().any(|owner| is_within(namespace, owner))
    }
}

/// Scan one source file. `file` is recorded in every location.
pub fn scan_source(file: &str, language: Language, text: &str) -> UsageScan {
    let lines = lexer::split_lines(text, language);
    let mut scan = UsageScan::default();

    for line in &lines {
        for namespace in imports_on_line(line, language) {
            scan.imports.push(ImportRef {
                namespace,
                location: SourceLocation::new(file, line.number),
            });
        }
        if let Some(ns) = namespace_on_line(line, language) {
            if !scan.namespaces.contains(&ns) {
                scan.namespaces.push(ns);
            }
        }
    }

    scan.registrations = registration::registrations(&lines, language)
        .into_iter()
        .map(|r| ServiceCall {
            call: r.call,
            service: r.service,
            location: SourceLocation::new(file, r.line),
            condition: r.condition,
        })
        .collect();
    scan
}

/// Service dependencies implied by registration calls.
///
/// One per (service, condition). An unconditional call adds nothing when the
/// descriptor already binds the service unconditionally.
pub fn service_dependencies(
    scan: &UsageScan,
    declared: &[DeclaredDependency],
) -> Vec<DeclaredDependency> {
    let mut out: Vec<DeclaredDependency> = Vec::new();
    for call in &scan.registrations {
        let already_declared = call.condition.is_none()
            && declared.iter().any(|d| {
                d.kind == DependencyKind::Service
                    && d.condition.is_none()
                    && d.name.eq_ignore_ascii_case(call.service)
            });
        let already_emitted = out
            .iter()
            .any(|d| d.name == call.service && d.condition == call.condition);
        if already_declared || already_emitted {
            continue;
        }
        out.push(DeclaredDependency {
            name: call.service.to_string(),
            constraint: VersionConstraint::Any,
            location: call.location.clone(),
            kind: DependencyKind::Service,
            provenance: Provenance::Inferred,
            condition: call.condition.clone(),
        });
    }
    out
}
