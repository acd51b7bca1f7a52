use std::path::PathBuf;

use polydep_core::config::PolydepConfig;

#[test]
fn test_load_defaults_without_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config = PolydepConfig::load(tmp.path()).unwrap();
    assert!(config.discovery.jobs > 0, "jobs should be > 0");
    assert!(config.discovery.ignore.is_empty());
    assert!(config.discovery.timeout_secs.is_none());
}

#[test]
fn test_load_from_root() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("polydep.toml"),
        r#"
[discovery]
ignore = ["legacy/**"]
jobs = 2

[lookup]
catalog = "catalog/versions.toml"
"#,
    )
    .unwrap();
    let config = PolydepConfig::load(tmp.path()).unwrap();
    assert_eq!(config.discovery.jobs, 2);
    assert_eq!(config.discovery.ignore, vec!["legacy/**".to_string()]);
    assert_eq!(
        config.catalog_path(tmp.path()),
        Some(tmp.path().join("catalog/versions.toml"))
    );
}

#[test]
fn test_load_rejects_bad_toml() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("polydep.toml"), "[discovery\njobs = ").unwrap();
    let err = PolydepConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_walk_root_without_project_path() {
    let config = PolydepConfig::default();
    assert_eq!(
        config.walk_root(std::path::Path::new("/tree")),
        PathBuf::from("/tree")
    );
}

#[test]
fn test_unknown_keys_are_tolerated() {
    let config = PolydepConfig::parse("[report]\nformat = \"json\"\n").unwrap();
    assert_eq!(config.lookup.catalog, None);
}
