//! MSBuild project file parsing: package, project and tool references,
//! framework properties, `Exec` commands, conditions, `$(Property)` interpolation.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use polydep_core::dependency::{
    DeclaredDependency, DependencyKind, Environment, Provenance, SourceLocation,
};
use polydep_core::version::VersionConstraint;

use crate::error::ParseError;

pub const WEB_SDK: &str = "Microsoft.NET.Sdk.Web";
pub const NETCORE_FRAMEWORK: &str = "Microsoft.NETCore.App";
pub const ASPNETCORE_FRAMEWORK: &str = "Microsoft.AspNetCore.App";

/// Package ids that name a shared framework rather than a NuGet package
/// (2.x era projects reference them without a version).
const SHARED_FRAMEWORK_PACKAGES: [&str; 2] = ["Microsoft.AspNetCore.App", "Microsoft.AspNetCore.All"];

/// Properties whose comparison in a `Condition` names an environment.
const ENVIRONMENT_PROPERTIES: [&str; 3] = [
    "$(Configuration)",
    "$(Environment)",
    "$(ASPNETCORE_ENVIRONMENT)",
];

/// A parsed MSBuild project file (`.csproj`, `.fsproj`, `.vbproj`, `.proj`).
#[derive(Debug, Clone, Default)]
pub struct ProjectFile {
    pub sdk: Option<String>,
    /// Line of the `<Project>` start tag.
    pub root_line: usize,
    /// `PropertyGroup` children keyed by lowercased name. The first
    /// unconditional value wins over any conditional one.
    pub properties: BTreeMap<String, Property>,
    pub items: Vec<ItemRef>,
    pub execs: Vec<ExecCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub value: String,
    pub line: usize,
    /// Innermost `Condition` on the property or its group.
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Package,
    Project,
    Tool,
}

impl ItemKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PackageReference" => Some(ItemKind::Package),
            "ProjectReference" => Some(ItemKind::Project),
            "DotNetCliToolReference" => Some(ItemKind::Tool),
            _ => None,
        }
    }
}

/// A reference item inside an `ItemGroup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub include: String,
    pub version: Option<String>,
    pub version_override: Option<String>,
    /// Innermost `Condition` of the item or any enclosing element.
    pub condition: Option<String>,
    pub line: usize,
}

/// An `Exec` task inside a `Target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    pub command: String,
    pub condition: Option<String>,
    pub line: usize,
}

impl ProjectFile {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(&name.to_ascii_lowercase())
    }

    /// A property set outside any `Condition`; configuration-specific
    /// values do not pin the runtime.
    fn unconditional(&self, name: &str) -> Option<&Property> {
        self.property(name).filter(|p| p.condition.is_none())
    }

    pub fn is_web_sdk(&self) -> bool {
        self.sdk
            .as_deref()
            .is_some_and(|sdk| sdk.trim().eq_ignore_ascii_case(WEB_SDK))
    }

    /// Whether any package reference belongs to a cloud service-discovery family.
    pub fn references_service_packages(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.kind == ItemKind::Package && is_service_package(&item.include))
    }

    /// Resolve `$(Property)` references using the file's own properties.
    ///
    /// A reference to a property that is already being expanded is left as
    /// written, so self-referencing and cyclic properties stay unresolved.
    pub fn interpolate(&self, input: &str) -> String {
        self.expand(input, &mut Vec::new())
    }

    fn expand(&self, input: &str, active: &mut Vec<String>) -> String {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find(')') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let key = after[..end].trim().to_ascii_lowercase();
            match self.properties.get(&key) {
                Some(prop) if !active.contains(&key) => {
                    active.push(key);
                    out.push_str(&self.expand(&prop.value, active));
                    active.pop();
                }
                _ => out.push_str(&rest[start..start + end + 3]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Target framework monikers with the line they were declared on.
    pub fn target_frameworks(&self) -> Vec<(String, usize)> {
        let prop = self
            .unconditional("TargetFramework")
            .or_else(|| self.unconditional("TargetFrameworks"));
        let Some(prop) = prop else {
            return Vec::new();
        };
        self.interpolate(&prop.value)
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| (t.to_string(), prop.line))
            .collect()
    }

    /// Runtime framework requirement and the line it comes from.
    ///
    /// `RuntimeFrameworkVersion` pins an exact version. Otherwise every
    /// runtime target framework contributes its feature band and the result
    /// spans from the lowest to the end of the highest major line.
    pub fn framework_constraint(&self) -> Result<Option<(VersionConstraint, usize)>, ParseError> {
        if let Some(prop) = self.unconditional("RuntimeFrameworkVersion") {
            let constraint = self.version_constraint(&prop.value, prop.line)?;
            return Ok(Some((constraint, prop.line)));
        }

        let mut line = 0;
        let mut versions = Vec::new();
        for (tfm, tfm_line) in self.target_frameworks() {
            if let Some(v) = runtime_version(&tfm) {
                line = tfm_line;
                versions.push(v);
            }
        }
        let (Some(low), Some(high)) = (versions.iter().min(), versions.iter().max()) else {
            return Ok(None);
        };
        let range = format!("[{}.{}.0,{}.0.0)", low.major, low.minor, high.major + 1);
        let constraint = VersionConstraint::parse(&range)
            .map_err(|e| ParseError::malformed(e.to_string(), Some(line)))?;
        Ok(Some((constraint, line)))
    }

    fn version_constraint(&self, raw: &str, line: usize) -> Result<VersionConstraint, ParseError> {
        let value = self.interpolate(raw);
        if value.contains("$(") {
            tracing::debug!("line {line}: unresolved property in version `{value}`, treating as any");
            return Ok(VersionConstraint::Any);
        }
        VersionConstraint::parse(&value).map_err(|e| ParseError::malformed(e.to_string(), Some(line)))
    }

    /// Normalized dependency list in document order: frameworks, then
    /// reference items, then tools required by `Exec` commands.
    pub fn dependencies(&self, file: &str) -> Result<Vec<DeclaredDependency>, ParseError> {
        let mut deps = Vec::new();

        match self.framework_constraint()? {
            Some((constraint, line)) => {
                if self.is_web_sdk() {
                    deps.push(framework(ASPNETCORE_FRAMEWORK, constraint.clone(), file, self.root_line));
                }
                deps.push(framework(NETCORE_FRAMEWORK, constraint, file, line));
            }
            None if self.is_web_sdk() => {
                deps.push(framework(ASPNETCORE_FRAMEWORK, VersionConstraint::Any, file, self.root_line));
            }
            None => {}
        }

        for item in &self.items {
            let include = self.interpolate(&item.include);
            let constraint = match item.version_override.as_ref().or(item.version.as_ref()) {
                Some(raw) => self.version_constraint(raw, item.line)?,
                None => VersionConstraint::Any,
            };
            let (name, kind) = match item.kind {
                ItemKind::Package if is_shared_framework(&include) => (include, DependencyKind::Framework),
                ItemKind::Package => (include, DependencyKind::Package),
                ItemKind::Project => (include.replace('\\', "/"), DependencyKind::Project),
                ItemKind::Tool => (include, DependencyKind::Tool),
            };
            deps.push(DeclaredDependency {
                name,
                constraint,
                location: SourceLocation::new(file, item.line),
                kind,
                provenance: Provenance::Declared,
                condition: item.condition.as_deref().map(condition_environment),
            });
        }

        for exec in &self.execs {
            let command = exec.command.trim_start();
            let condition = exec.condition.as_deref().map(condition_environment);
            let mut tools = Vec::new();
            if command.starts_with("node ") || command.starts_with("npm ") {
                tools.push("node");
            }
            if command.starts_with("npm ") {
                tools.push("npm");
            }
            for tool in tools {
                let seen = deps.iter().any(|d| {
                    d.kind == DependencyKind::Tool && d.name == tool && d.condition == condition
                });
                if !seen {
                    deps.push(
                        DeclaredDependency::package(tool, VersionConstraint::Any, SourceLocation::new(file, exec.line))
                            .with_kind(DependencyKind::Tool)
                            .with_condition(condition.clone()),
                    );
                }
            }
        }

        Ok(deps)
    }
}

fn framework(name: &str, constraint: VersionConstraint, file: &str, line: usize) -> DeclaredDependency {
    DeclaredDependency::package(name, constraint, SourceLocation::new(file, line))
        .with_kind(DependencyKind::Framework)
}

fn is_shared_framework(name: &str) -> bool {
    SHARED_FRAMEWORK_PACKAGES
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

/// `Steeltoe.*` and `Pivotal.Discovery.*` packages.
pub fn is_service_package(name: &str) -> bool {
    let lower = name.trim().to_ascii_lowercase();
    lower.starts_with("steeltoe.") || lower.starts_with("pivotal.discovery.")
}

/// Runtime version band of a target framework moniker.
///
/// `netcoreapp3.1` -> 3.1.0, `net6.0` -> 6.0.0, `net8.0-windows` -> 8.0.0.
/// .NET Framework (`net472`) and `netstandard*` targets have no runtime band.
pub fn runtime_version(tfm: &str) -> Option<semver::Version> {
    let tfm = tfm.trim().to_ascii_lowercase();
    if tfm.starts_with("netstandard") {
        return None;
    }
    let (rest, core_app) = match tfm.strip_prefix("netcoreapp") {
        Some(rest) => (rest, true),
        None => (tfm.strip_prefix("net")?, false),
    };
    let rest = rest.split('-').next().unwrap_or(rest);
    let (major, minor) = rest.split_once('.')?;
    let major: u64 = major.parse().ok()?;
    let minor: u64 = minor.parse().ok()?;
    if !core_app && major < 5 {
        return None;
    }
    Some(semver::Version::new(major, minor, 0))
}

/// Environment named by an MSBuild `Condition`.
///
/// `'$(Configuration)' == 'Debug'` and `'$(Configuration)|$(Platform)' ==
/// 'Debug|AnyCPU'` name `Debug`; anything else is kept verbatim.
pub fn condition_environment(raw: &str) -> Environment {
    let trimmed = raw.trim();
    ENVIRONMENT_PROPERTIES
        .iter()
        .find_map(|prop| compared_value(trimmed, prop))
        .map(Environment::Named)
        .unwrap_or_else(|| Environment::Named(trimmed.to_string()))
}

fn compared_value(condition: &str, property: &str) -> Option<String> {
    let lower = condition.to_ascii_lowercase();
    let at = lower.find(&property.to_ascii_lowercase())?;
    let lhs_start = condition[..at].rfind('\'')? + 1;
    let slot = condition[lhs_start..at].matches('|').count();

    let after = &condition[at..];
    let eq = after.find("==")?;
    let lhs_rest = after[..eq].to_ascii_lowercase();
    if lhs_rest.contains(" and ") || lhs_rest.contains(" or ") {
        return None;
    }
    let rhs = after[eq + 2..].trim_start().strip_prefix('\'')?;
    let end = rhs.find('\'')?;
    let value = rhs[..end].split('|').nth(slot)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Byte offset to 1-based line, advancing monotonically.
struct LineTracker<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> LineTracker<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, pos: usize) -> usize {
        let pos = pos.min(self.bytes.len());
        if pos > self.pos {
            self.line += self.bytes[self.pos..pos].iter().filter(|b| **b == b'\n').count();
            self.pos = pos;
        }
        self.line
    }
}

#[derive(Default)]
struct ReaderState {
    project: ProjectFile,
    path: Vec<String>,
    conditions: Vec<Option<String>>,
    text_buf: String,
    current_item: Option<ItemRef>,
    item_depth: usize,
    seen_root: bool,
}

impl ReaderState {
    fn innermost_condition(&self) -> Option<String> {
        self.conditions.iter().rev().flatten().next().cloned()
    }

    fn open(&mut self, e: &BytesStart, line: usize) -> Result<(), ParseError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
        let attrs = attributes(e, line)?;

        if self.path.is_empty() {
            if self.seen_root {
                return Err(ParseError::malformed("multiple root elements", Some(line)));
            }
            if tag != "Project" {
                return Err(ParseError::malformed(
                    format!("expected <Project> root element, found <{tag}>"),
                    Some(line),
                ));
            }
            self.seen_root = true;
            self.project.sdk = attrs.get("Sdk").cloned();
            self.project.root_line = line;
        }

        self.path.push(tag.clone());
        self.conditions.push(attrs.get("Condition").cloned());
        self.text_buf.clear();

        if self.path.len() == 2 && tag == "Sdk" && self.project.sdk.is_none() {
            self.project.sdk = attrs.get("Name").cloned();
        }

        let parent = self.path.len().checked_sub(2).and_then(|i| self.path.get(i));
        if let Some(kind) = ItemKind::from_tag(&tag) {
            if parent.is_some_and(|p| p == "ItemGroup") {
                let include = attrs
                    .get("Include")
                    .or_else(|| attrs.get("Update"))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ParseError::malformed(format!("<{tag}> without Include"), Some(line))
                    })?;
                self.current_item = Some(ItemRef {
                    kind,
                    include,
                    version: attrs.get("Version").cloned(),
                    version_override: attrs.get("VersionOverride").cloned(),
                    condition: self.innermost_condition(),
                    line,
                });
                self.item_depth = self.path.len();
            }
        }

        if tag == "Exec" && self.path.iter().any(|p| p == "Target") {
            if let Some(command) = attrs.get("Command") {
                self.project.execs.push(ExecCommand {
                    command: command.trim().to_string(),
                    condition: self.innermost_condition(),
                    line,
                });
            }
        }
        Ok(())
    }

    fn close(&mut self, line: usize) {
        let depth = self.path.len();
        let tag = self.path.last().cloned().unwrap_or_default();

        // <Project><PropertyGroup><Name>value</Name>
        if depth == 3 && self.path[1] == "PropertyGroup" {
            let value = self.text_buf.trim();
            let condition = self.innermost_condition();
            let key = tag.to_ascii_lowercase();
            let replace = match self.project.properties.get(&key) {
                None => true,
                Some(existing) => existing.condition.is_some() && condition.is_none(),
            };
            if !value.is_empty() && replace {
                let property = Property {
                    value: value.to_string(),
                    line,
                    condition,
                };
                self.project.properties.insert(key, property);
            }
        }

        if let Some(ref mut item) = self.current_item {
            if depth == self.item_depth + 1 {
                let value = self.text_buf.trim().to_string();
                match tag.as_str() {
                    "Version" if !value.is_empty() => item.version = Some(value),
                    "VersionOverride" if !value.is_empty() => item.version_override = Some(value),
                    _ => {}
                }
            }
            if depth == self.item_depth {
                if let Some(item) = self.current_item.take() {
                    self.project.items.push(item);
                }
            }
        }

        self.path.pop();
        self.conditions.pop();
        self.text_buf.clear();
    }
}

fn attributes(e: &BytesStart, line: usize) -> Result<BTreeMap<String, String>, ParseError> {
    let mut map = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::malformed(format!("bad attribute: {err}"), Some(line)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::malformed(format!("bad attribute value: {err}"), Some(line)))?;
        map.insert(key, value.to_string());
    }
    Ok(map)
}

/// Parse project file XML into a [`ProjectFile`]. Comments are skipped.
pub fn parse_project_file(xml: &str) -> Result<ProjectFile, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines = LineTracker::new(xml);
    let mut state = ReaderState::default();

    loop {
        let event = reader.read_event();
        let line = lines.line_at(usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX));
        match event {
            Ok(Event::Start(ref e)) => state.open(e, line)?,
            Ok(Event::Empty(ref e)) => {
                state.open(e, line)?;
                state.close(line);
            }
            Ok(Event::Text(ref e)) => {
                state.text_buf = e.unescape().map(|t| t.to_string()).unwrap_or_default();
            }
            Ok(Event::End(_)) => state.close(line),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ParseError::malformed(format!("invalid XML: {e}"), Some(line)));
            }
            _ => {}
        }
    }

    if let Some(open) = state.path.last() {
        return Err(ParseError::malformed(
            format!("unexpected end of file inside <{open}>"),
            None,
        ));
    }
    if !state.seen_root {
        return Err(ParseError::malformed("no <Project> element", None));
    }
    Ok(state.project)
}
