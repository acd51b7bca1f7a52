//! Import statements and owned namespace declarations.

use once_cell::sync::Lazy;
use regex::Regex;

use polydep_core::dependency::SourceLocation;
use polydep_core::project::Language;

use crate::lexer::LineParts;

/// Dotted identifier, `@`-escaped segments allowed.
const NAME: &str = r"@?[\p{L}_]\w*(?:\.@?[\p{L}_]\w*)*";

static RE_CS_USING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:global\s+)?using\s+(?:static\s+)?(?:@?\w+\s*=\s*)?({NAME})\s*(?:<.*)?$"
    ))
    .unwrap()
});

static RE_FS_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^open\s+(?:type\s+)?({NAME})\s*$")).unwrap());

static RE_VB_IMPORTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i:imports)\s+(.+)$").unwrap());

static RE_VB_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(?:@?\w+\s*=\s*)?({NAME})\s*(?:<.*)?$")).unwrap());

static RE_CS_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^namespace\s+({NAME})(?:[\s{{;]|$)")).unwrap());

static RE_FS_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(?:namespace|module)\s+(?:rec\s+)?({NAME})(?:[\s=]|$)")).unwrap()
});

static RE_VB_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(?i:namespace)\s+({NAME})(?:\s|$)")).unwrap());

/// A namespace imported by a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub namespace: String,
    pub location: SourceLocation,
}

/// Imports on one line of live code.
pub fn imports_on_line(line: &LineParts, language: Language) -> Vec<String> {
    let code = line.code.trim();
    match language {
        Language::CSharp => code
            .split(';')
            .filter_map(|statement| captured_name(&RE_CS_USING, statement.trim()))
            .collect(),
        Language::FSharp => captured_name(&RE_FS_OPEN, code).into_iter().collect(),
        Language::VisualBasic => RE_VB_IMPORTS
            .captures(code)
            .and_then(|caps| caps.get(1))
            .map(|clauses| {
                clauses
                    .as_str()
                    .split(',')
                    .filter_map(|clause| captured_name(&RE_VB_CLAUSE, clause.trim()))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Namespaces declared on one line of live code.
pub fn namespace_on_line(line: &LineParts, language: Language) -> Option<String> {
    let re = match language {
        Language::CSharp => &RE_CS_NAMESPACE,
        Language::FSharp => &RE_FS_NAMESPACE,
        Language::VisualBasic => &RE_VB_NAMESPACE,
    };
    captured_name(re, line.code.trim())
}

/// First capture group as a dotted name with `@` escapes dropped.
fn captured_name(re: &Regex, text: &str) -> Option<String> {
    let name = re.captures(text)?.get(1)?.as_str();
    Some(name.replace('@', ""))
}

/// Whether `namespace` is `owner` or nested inside it.
pub fn is_within(namespace: &str, owner: &str) -> bool {
    let ns = namespace.as_bytes();
    let ow = owner.as_bytes();
    ns.len() >= ow.len()
        && ns[..ow.len()].eq_ignore_ascii_case(ow)
        && (ns.len() == ow.len() || ns[ow.len()] == b'.')
}
