//! Package version parsing, comparison, ranges and constraints.
//!
//! Versions follow NuGet conventions:
//! - up to four numeric release segments (`1.2`, `1.2.3`, `4.0.0.1`),
//!   missing trailing segments compare as zero
//! - an optional `-` prerelease label of dot-separated identifiers; any
//!   prerelease sorts before its release
//! - `+` build metadata is ignored for ordering
//!
//! Constraints are either `*` (any), a bare version (exact), interval
//! notation (`[1.0,2.0)`, `(,3.0]`, `[1.5]`), or a floating version (`1.2.*`).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A version or constraint string that could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid version `{input}`: {reason}")]
pub struct VersionError {
    pub input: String,
    pub reason: String,
}

impl VersionError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed package version with comparable segments.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    pub original: String,
    release: Vec<u64>,
    prerelease: Vec<Identifier>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Identifier {
    Numeric(u64),
    Text(String),
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl PackageVersion {
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err(VersionError::new(version, "empty version"));
        }
        let without_meta = trimmed.split('+').next().unwrap_or(trimmed);
        let (release_part, pre_part) = match without_meta.split_once('-') {
            Some((r, p)) => (r, Some(p)),
            None => (without_meta, None),
        };

        let mut release = Vec::new();
        for segment in release_part.split('.') {
            let n = segment
                .parse::<u64>()
                .map_err(|_| VersionError::new(version, format!("`{segment}` is not numeric")))?;
            release.push(n);
        }
        if release.len() > 4 {
            return Err(VersionError::new(version, "more than four release segments"));
        }

        let mut prerelease = Vec::new();
        if let Some(pre) = pre_part {
            for ident in pre.split('.') {
                if ident.is_empty() {
                    return Err(VersionError::new(version, "empty prerelease identifier"));
                }
                prerelease.push(classify(ident));
            }
        }

        Ok(Self {
            original: trimmed.to_string(),
            release,
            prerelease,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Major release segment.
    pub fn major(&self) -> u64 {
        self.release.first().copied().unwrap_or(0)
    }

    /// Smallest version of the next major line (`3.1.4` -> `4.0.0`).
    pub fn next_major(&self) -> PackageVersion {
        let major = self.major() + 1;
        Self {
            original: format!("{major}.0.0"),
            release: vec![major, 0, 0],
            prerelease: Vec::new(),
        }
    }
}

fn classify(token: &str) -> Identifier {
    match token.parse::<u64>() {
        Ok(n) => Identifier::Numeric(n),
        Err(_) => Identifier::Text(token.to_lowercase()),
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.release.len().max(other.release.len());
        for i in 0..max_len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            let ord = a.cmp(&b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        compare_prerelease(&self.prerelease, &other.prerelease)
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_prerelease(a: &[Identifier], b: &[Identifier]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (x, y) {
            (Identifier::Numeric(x), Identifier::Numeric(y)) => x.cmp(y),
            (Identifier::Numeric(_), Identifier::Text(_)) => Ordering::Less,
            (Identifier::Text(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::Text(x), Identifier::Text(y)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// A version interval such as `[1.0,2.0)`.
///
/// `None` bounds are unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: PackageVersion,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(version: PackageVersion) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    pub fn exclusive(version: PackageVersion) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

impl VersionRange {
    /// Parse interval notation. `[1.5]` is accepted and yields a degenerate
    /// range containing only `1.5`.
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let s = spec.trim();
        if s.len() < 2 || !(s.starts_with('[') || s.starts_with('(')) {
            return Err(VersionError::new(spec, "range must start with `[` or `(`"));
        }
        if !(s.ends_with(']') || s.ends_with(')')) {
            return Err(VersionError::new(spec, "range must end with `]` or `)`"));
        }

        let open_inclusive = s.starts_with('[');
        let close_inclusive = s.ends_with(']');
        let inner = &s[1..s.len() - 1];

        let range = if let Some((lower, upper)) = inner.split_once(',') {
            let lower = lower.trim();
            let upper = upper.trim();
            VersionRange {
                lower: if lower.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: PackageVersion::parse(lower)?,
                        inclusive: open_inclusive,
                    })
                },
                upper: if upper.is_empty() {
                    None
                } else {
                    Some(Bound {
                        version: PackageVersion::parse(upper)?,
                        inclusive: close_inclusive,
                    })
                },
            }
        } else {
            if !(open_inclusive && close_inclusive) {
                return Err(VersionError::new(spec, "single-version range must use `[...]`"));
            }
            let v = PackageVersion::parse(inner)?;
            VersionRange {
                lower: Some(Bound::inclusive(v.clone())),
                upper: Some(Bound::inclusive(v)),
            }
        };

        if range.is_empty() {
            return Err(VersionError::new(spec, "range contains no versions"));
        }
        Ok(range)
    }

    /// Check if a version satisfies this range.
    pub fn contains(&self, version: &PackageVersion) -> bool {
        if let Some(ref lower) = self.lower {
            let cmp = version.cmp(&lower.version);
            if lower.inclusive {
                if cmp == Ordering::Less {
                    return false;
                }
            } else if cmp != Ordering::Greater {
                return false;
            }
        }
        if let Some(ref upper) = self.upper {
            let cmp = version.cmp(&upper.version);
            if upper.inclusive {
                if cmp == Ordering::Greater {
                    return false;
                }
            } else if cmp != Ordering::Less {
                return false;
            }
        }
        true
    }

    /// True when no version can satisfy the range.
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.version.cmp(&upper.version) {
                Ordering::Less => false,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Greater => true,
            },
            _ => false,
        }
    }

    /// Intersect two ranges. Returns `None` if the intersection is empty.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let lower = tighter_bound(self.lower.as_ref(), other.lower.as_ref(), Ordering::Greater);
        let upper = tighter_bound(self.upper.as_ref(), other.upper.as_ref(), Ordering::Less);
        let range = VersionRange { lower, upper };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// The single version this range admits, if it is degenerate (`[1.5]`).
    pub fn as_exact(&self) -> Option<&PackageVersion> {
        match (&self.lower, &self.upper) {
            (Some(l), Some(u)) if l.inclusive && u.inclusive && l.version == u.version => {
                Some(&l.version)
            }
            _ => None,
        }
    }
}

/// Pick the more restrictive of two bounds. `prefer` is the ordering of the
/// version that wins: `Greater` for lower bounds, `Less` for upper bounds.
fn tighter_bound(a: Option<&Bound>, b: Option<&Bound>, prefer: Ordering) -> Option<Bound> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            let ord = x.version.cmp(&y.version);
            if ord == Ordering::Equal {
                Some(Bound {
                    version: x.version.clone(),
                    inclusive: x.inclusive && y.inclusive,
                })
            } else if ord == prefer {
                Some(x.clone())
            } else {
                Some(y.clone())
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.as_exact() {
            return write!(f, "[{v}]");
        }
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => f.write_str(")"),
        }
    }
}

/// A version requirement attached to one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// No version stated (`*`, empty, or inferred from usage).
    Any,
    /// A bare version: exactly this version.
    Exact(PackageVersion),
    /// An interval or floating version.
    Range(VersionRange),
}

impl VersionConstraint {
    /// Parse a constraint string as written in a descriptor.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(VersionConstraint::Any);
        }
        if s.starts_with('[') || s.starts_with('(') {
            let range = VersionRange::parse(s)?;
            return Ok(match range.as_exact() {
                Some(v) => VersionConstraint::Exact(v.clone()),
                None => VersionConstraint::Range(range),
            });
        }
        if s.contains('*') {
            return parse_floating(s);
        }
        Ok(VersionConstraint::Exact(PackageVersion::parse(s)?))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, VersionConstraint::Any)
    }

    /// Whether `version` satisfies this constraint.
    pub fn allows(&self, version: &PackageVersion) -> bool {
        match self {
            VersionConstraint::Any => true,
            VersionConstraint::Exact(v) => v == version,
            VersionConstraint::Range(r) => r.contains(version),
        }
    }
}

/// `1.2.*` -> `[1.2.0,1.3.0)`, `1.*` -> `[1.0.0,2.0.0)`.
fn parse_floating(s: &str) -> Result<VersionConstraint, VersionError> {
    let Some(prefix) = s.strip_suffix(".*") else {
        return Err(VersionError::new(s, "only trailing `.*` floating versions are supported"));
    };
    let mut segments = Vec::new();
    for seg in prefix.split('.') {
        let n = seg
            .parse::<u64>()
            .map_err(|_| VersionError::new(s, format!("`{seg}` is not numeric")))?;
        segments.push(n);
    }
    if segments.is_empty() || segments.len() > 3 {
        return Err(VersionError::new(s, "floating version needs one to three fixed segments"));
    }

    let mut lower = segments.clone();
    lower.resize(3, 0);
    let mut upper = segments;
    if let Some(last) = upper.last_mut() {
        *last += 1;
    }
    upper.resize(3, 0);

    let render = |parts: &[u64]| {
        parts
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    };
    Ok(VersionConstraint::Range(VersionRange {
        lower: Some(Bound::inclusive(PackageVersion::parse(&render(&lower))?)),
        upper: Some(Bound::exclusive(PackageVersion::parse(&render(&upper))?)),
    }))
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Any => f.write_str("*"),
            VersionConstraint::Exact(v) => write!(f, "{v}"),
            VersionConstraint::Range(r) => write!(f, "{r}"),
        }
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VersionConstraint::parse(&raw).map_err(serde::de::Error::custom)
    }
}
