use polydep_core::version::{PackageVersion, VersionConstraint, VersionRange};

fn v(s: &str) -> PackageVersion {
    PackageVersion::parse(s).unwrap()
}

#[test]
fn test_sorting_real_package_versions() {
    let mut versions = vec![
        v("3.1.0"),
        v("2.2.0"),
        v("3.0.2"),
        v("3.1.0-rc.1"),
        v("10.0.0"),
        v("3.0.0"),
    ];
    versions.sort();
    let rendered: Vec<String> = versions.iter().map(|x| x.to_string()).collect();
    assert_eq!(
        rendered,
        vec!["2.2.0", "3.0.0", "3.0.2", "3.1.0-rc.1", "3.1.0", "10.0.0"]
    );
}

#[test]
fn test_original_text_is_kept() {
    assert_eq!(v("2.2").to_string(), "2.2");
    assert_eq!(v(" 5.6.3 ").to_string(), "5.6.3");
}

#[test]
fn test_range_intersection_picks_overlap() {
    let a = VersionRange::parse("[1.0,2.0)").unwrap();
    let b = VersionRange::parse("[1.5,3.0)").unwrap();
    let c = a.intersect(&b).unwrap();
    assert!(c.contains(&v("1.9.9")));
    assert!(c.contains(&v("1.5")));
    assert!(!c.contains(&v("2.0")));
}

#[test]
fn test_exact_inside_range() {
    let range = VersionConstraint::parse("[2.0,3.0)").unwrap();
    assert!(range.allows(&v("2.2")));
    assert!(!range.allows(&v("3.0")));
}

#[test]
fn test_framework_style_range() {
    let c = VersionConstraint::parse("[6.0.0,7.0.0)").unwrap();
    assert!(c.allows(&v("6.0.36")));
    assert!(!c.allows(&v("7.0.0")));
}

#[test]
fn test_invalid_constraint() {
    assert!(VersionConstraint::parse("[1.0,2.0").is_err());
    assert!(VersionConstraint::parse("latest").is_err());
    assert!(VersionConstraint::parse("1.0-*").is_err());
}
