use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(deprecated)]
fn polydep_cmd() -> Command {
    Command::cargo_bin("polydep").unwrap()
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(name)
}

fn write_conflicting_tree(root: &Path) {
    for (dir, version) in [("a", "1.0"), ("b", "2.0")] {
        fs::create_dir_all(root.join(dir)).unwrap();
        fs::write(
            root.join(dir).join(format!("{dir}.csproj")),
            format!(
                r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="Lib" Version="{version}" />
  </ItemGroup>
</Project>"#
            ),
        )
        .unwrap();
    }
}

#[test]
fn test_resolve_prints_manifest_json() {
    let output = polydep_cmd()
        .arg("resolve")
        .arg(fixture("multiple_projects_msbuild"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Discovered"))
        .get_output()
        .stdout
        .clone();

    let manifest: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(
        manifest["packages"]["Newtonsoft.Json"]["resolution"]["resolved"],
        "12.0.3"
    );
    assert_eq!(manifest["projects"].as_array().unwrap().len(), 3);
}

#[test]
fn test_resolve_writes_output_file() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("manifest.json");

    polydep_cmd()
        .arg("resolve")
        .arg(fixture("minimal_aspnet"))
        .arg("--catalog")
        .arg(fixture("versions.toml"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = fs::read_to_string(&out).unwrap();
    assert!(content.contains("Swashbuckle.AspNetCore"));
    assert!(content.contains("6.0.25"));
}

#[test]
fn test_resolve_reports_conflicts_without_failing() {
    let tmp = TempDir::new().unwrap();
    write_conflicting_tree(tmp.path());

    polydep_cmd()
        .current_dir(tmp.path())
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"conflicts\""))
        .stderr(predicate::str::contains("Version conflicts (1):"))
        .stderr(predicate::str::contains("Lib: 1.0 vs 2.0"));
}

#[test]
fn test_resolve_fail_on_conflict() {
    let tmp = TempDir::new().unwrap();
    write_conflicting_tree(tmp.path());

    polydep_cmd()
        .current_dir(tmp.path())
        .args(["resolve", "--fail-on-conflict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 conflicting dependencies"));
}

#[test]
fn test_resolve_missing_root_fails() {
    let tmp = TempDir::new().unwrap();

    polydep_cmd()
        .arg("resolve")
        .arg(tmp.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source tree not found"));
}

#[test]
fn test_resolve_rejects_zero_jobs() {
    polydep_cmd()
        .arg("resolve")
        .arg(fixture("minimal_aspnet"))
        .args(["--jobs", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--jobs must be at least 1"));
}

#[test]
fn test_project_path_from_config() {
    let tmp = TempDir::new().unwrap();
    write_conflicting_tree(&tmp.path().join("src"));
    fs::create_dir_all(tmp.path().join("other")).unwrap();
    fs::write(
        tmp.path().join("other/other.csproj"),
        r#"<Project><ItemGroup><PackageReference Include="Other" Version="1.0.0" /></ItemGroup></Project>"#,
    )
    .unwrap();
    fs::write(
        tmp.path().join("polydep.toml"),
        "[discovery]\nproject-path = \"other\"\n",
    )
    .unwrap();

    polydep_cmd()
        .current_dir(tmp.path())
        .env_remove("POLYDEP_PROJECT_PATH")
        .arg("resolve")
        .assert()
        .success()
        .stdout(predicate::str::contains("other/other.csproj"))
        .stdout(predicate::str::contains("src/a/a.csproj").not());
}
