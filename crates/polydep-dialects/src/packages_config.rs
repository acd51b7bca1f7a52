//! Legacy `packages.config` companion descriptors.

use quick_xml::events::Event;
use quick_xml::Reader;

use polydep_core::dependency::{DeclaredDependency, Environment, SourceLocation};
use polydep_core::version::VersionConstraint;

use crate::error::ParseError;

pub const FILE_NAME: &str = "packages.config";

pub fn is_packages_config(file_name: &str) -> bool {
    file_name
        .rsplit(['/', '\\'])
        .next()
        .is_some_and(|n| n.eq_ignore_ascii_case(FILE_NAME))
}

/// Parse `<packages><package id=".." version=".." /></packages>`.
///
/// `developmentDependency="true"` entries are conditional on `Development`.
pub fn parse(file: &str, xml: &str) -> Result<Vec<DeclaredDependency>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut deps = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader.read_event();
        let pos = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        let line = xml.as_bytes()[..pos.min(xml.len())]
            .iter()
            .filter(|b| **b == b'\n')
            .count()
            + 1;
        match event {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let is_empty = matches!(event, Ok(Event::Empty(_)));
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if depth == 0 {
                    if tag != "packages" {
                        return Err(ParseError::malformed(
                            format!("expected <packages> root element, found <{tag}>"),
                            Some(line),
                        ));
                    }
                    seen_root = true;
                } else if depth == 1 && tag == "package" {
                    let mut id = None;
                    let mut version = None;
                    let mut development = false;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| {
                            ParseError::malformed(format!("bad attribute: {err}"), Some(line))
                        })?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| {
                                ParseError::malformed(format!("bad attribute value: {err}"), Some(line))
                            })?
                            .to_string();
                        match attr.key.as_ref() {
                            b"id" => id = Some(value),
                            b"version" => version = Some(value),
                            b"developmentDependency" => development = value.trim() == "true",
                            _ => {}
                        }
                    }
                    let id = id
                        .filter(|s| !s.trim().is_empty())
                        .ok_or_else(|| ParseError::malformed("<package> without id", Some(line)))?;
                    let constraint = match version {
                        Some(v) => VersionConstraint::parse(&v)
                            .map_err(|e| ParseError::malformed(e.to_string(), Some(line)))?,
                        None => VersionConstraint::Any,
                    };
                    let condition = development.then(|| Environment::named("Development"));
                    deps.push(
                        DeclaredDependency::package(id.trim(), constraint, SourceLocation::new(file, line))
                            .with_condition(condition),
                    );
                }
                if !is_empty {
                    depth += 1;
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::malformed(format!("invalid XML: {e}"), Some(line))),
            _ => {}
        }
    }

    if !seen_root || depth != 0 {
        return Err(ParseError::malformed("missing or unclosed <packages> element", None));
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polydep_core::dependency::DependencyKind;

    #[test]
    fn parse_packages() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="Newtonsoft.Json" version="12.0.3" targetFramework="net472" />
  <package id="Microsoft.CodeDom.Providers.DotNetCompilerPlatform" version="2.0.1" targetFramework="net472" developmentDependency="true" />
</packages>"#;
        let deps = parse("web/packages.config", xml).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "Newtonsoft.Json");
        assert_eq!(deps[0].constraint.to_string(), "12.0.3");
        assert_eq!(deps[0].location.line, 3);
        assert_eq!(deps[0].kind, DependencyKind::Package);
        assert_eq!(deps[0].condition, None);
        assert_eq!(deps[1].condition, Some(Environment::named("Development")));
    }

    #[test]
    fn missing_id_is_malformed() {
        let xml = r#"<packages><package version="1.0" /></packages>"#;
        assert!(parse("packages.config", xml).is_err());
    }

    #[test]
    fn wrong_root_is_malformed() {
        assert!(parse("packages.config", "<Project />").is_err());
    }

    #[test]
    fn recognizes_file_name() {
        assert!(is_packages_config("src/web/Packages.Config"));
        assert!(!is_packages_config("packages.config.bak"));
    }
}
