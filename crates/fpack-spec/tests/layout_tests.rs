//! Layout descriptors read from disk and validated

use fpack_spec::{
    CapabilitySpec, ConfigId, ConfigItem, FeatureIdRef, FeaturePackLayout, Gav, SpecRef,
    ValidationError, Validator,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use tempfile::TempDir;

const DATASOURCES: &str = r#"
[feature-pack]
gav = "org.example:datasources:2.1"
default-packages = ["ds.base"]

[[feature-pack.dependency]]
gav = "org.example:core:1.0"
origin = "core"

[[feature-pack.config]]
name = "main"

[[feature-pack.config.items]]
kind = "feature"
spec = "datasource"
params = { name = "ExampleDS", driver = "h2" }

[[spec]]
name = "datasource"
requires = ["jdbc-driver.$driver"]
packages = [{ name = "ds.base" }]

[[spec.params]]
name = "name"
feature-id = true

[[spec.params]]
name = "driver"

[[spec.refs]]
feature = "core#subsystem"
mappings = { driver = "name" }
nillable = true

[[package]]
name = "ds.base"
deps = [{ origin = "core", name = "core.modules" }]
"#;

fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("feature-pack.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_layout_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(&temp_dir, DATASOURCES);

    let layout = FeaturePackLayout::from_file(&path).unwrap();
    assert_eq!(layout.gav(), &Gav::new("org.example", "datasources", "2.1"));
    assert!(Validator::validate(&layout).is_ok());

    let spec = layout.feature_spec("datasource").unwrap();
    assert!(spec.has_id());
    assert_eq!(spec.requires[0].to_string(), "jdbc-driver.$driver");
    assert_eq!(spec.refs[0].feature, SpecRef::with_origin("core", "subsystem"));

    let config = &layout.spec.configs[0];
    assert_eq!(config.id(), ConfigId::name_only("main"));
    match &config.items[0] {
        ConfigItem::Feature(feature) => {
            assert_eq!(feature.params.get("driver").map(String::as_str), Some("h2"))
        }
        other => panic!("expected a feature, got {:?}", other),
    }
}

#[test]
fn test_missing_layout_file() {
    let temp_dir = TempDir::new().unwrap();
    assert!(FeaturePackLayout::from_file(&temp_dir.path().join("feature-pack.toml")).is_err());
}

#[test]
fn test_written_layout_reads_back() {
    let temp_dir = TempDir::new().unwrap();
    let layout = FeaturePackLayout::from_str(DATASOURCES).unwrap();
    let path = write(&temp_dir, &layout.to_string().unwrap());

    assert_eq!(FeaturePackLayout::from_file(&path).unwrap(), layout);
}

#[test]
fn test_validation_collects_every_problem() {
    let content = DATASOURCES
        .replace("origin = \"core\"\n", "origin = \"base\"\n")
        .replace("default-packages = [\"ds.base\"]", "default-packages = [\"ds.extra\"]");
    let layout = FeaturePackLayout::from_str(&content).unwrap();

    let errors = Validator::validate(&layout).unwrap_err();
    let unknown_origins = errors
        .iter()
        .filter(|e| matches!(e, ValidationError::UnknownOrigin { origin, .. } if origin == "core"))
        .count();
    assert_eq!(unknown_origins, 2);
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::UnknownPackage { package, .. } if package == "ds.extra"
    )));
}

#[rstest]
#[case("org:core:1.0", true)]
#[case("org:core", true)]
#[case("org::1.0", false)]
#[case("org:core:1.0:extra", false)]
#[case("core", false)]
fn test_parse_coordinate(#[case] input: &str, #[case] valid: bool) {
    assert_eq!(input.parse::<Gav>().is_ok(), valid);
}

#[rstest]
#[case("logger:name=root", true)]
#[case("core#logger:name=root,level=info", true)]
#[case("logger", false)]
#[case("logger:name", false)]
#[case("logger:=root", false)]
#[case("#logger:name=root", false)]
fn test_parse_feature_id(#[case] input: &str, #[case] valid: bool) {
    assert_eq!(input.parse::<FeatureIdRef>().is_ok(), valid);
}

#[rstest]
#[case("logging", true)]
#[case("jdbc-driver.$driver", false)]
#[case("$a.$b", false)]
fn test_capability_is_static(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(CapabilitySpec::parse(expr).unwrap().is_static(), expected);
}
