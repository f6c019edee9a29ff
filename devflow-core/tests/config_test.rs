use std::path::PathBuf;

use devflow_core::config::{ProjectConfig, Verb, CONFIG_FILE};
use devflow_core::error::Error;
use devflow_core::job::CommandSet;
use tempfile::TempDir;

#[test]
fn test_parse_config() {
    let toml = r#"
package_manager = "pnpm"

[commands]
build = "pnpm run build"
watch = ["pnpm run serve", "pnpm run styles -- --watch"]

[watch]
path = "src"
ignore = ["*.log", "dist/**"]
debounce_ms = 250

[clean]
paths = ["dist", "coverage"]
"#;

    let config = ProjectConfig::parse(toml).unwrap();
    assert_eq!(config.package_manager(), "pnpm");
    assert_eq!(
        config.command(Verb::Build),
        Some(&CommandSet::from("pnpm run build"))
    );
    assert_eq!(config.command(Verb::Watch).map(|c| c.len()), Some(2));
    assert_eq!(config.watch.path, Some(PathBuf::from("src")));
    assert_eq!(config.watch.ignore.len(), 2);
    assert_eq!(config.watch.debounce_ms, Some(250));
    assert_eq!(config.clean.paths.len(), 2);
}

#[test]
fn test_parse_config_defaults() {
    let config = ProjectConfig::parse("").unwrap();
    assert_eq!(config.package_manager(), "npm");
    assert!(config.commands.is_empty());
    assert!(config.watch.ignore.is_empty());
    assert_eq!(config.clean.paths, vec![PathBuf::from("dist")]);
}

#[test]
fn test_empty_command_rejected() {
    let err = ProjectConfig::parse(
        r#"
[commands]
test = []
"#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_resolution_precedence() {
    let config = ProjectConfig::parse(
        r#"
package_manager = "yarn"

[commands]
test = "yarn jest --ci"
"#,
    )
    .unwrap();

    assert_eq!(
        config.resolve(Verb::Test, Some(CommandSet::from("yarn jest -t auth"))),
        Some(CommandSet::from("yarn jest -t auth"))
    );
    assert_eq!(
        config.resolve(Verb::Test, None),
        Some(CommandSet::from("yarn jest --ci"))
    );
    assert_eq!(
        config.resolve(Verb::Build, None),
        Some(CommandSet::from("yarn run build"))
    );
    assert_eq!(config.resolve(Verb::Watch, None), None);
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ProjectConfig::load(dir.path()).unwrap();
    assert_eq!(config.project_dir.as_deref(), Some(dir.path()));
    assert!(config.commands.is_empty());
}

#[test]
fn test_load_reports_file_in_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE), "commands = 3").unwrap();

    match ProjectConfig::load(dir.path()).unwrap_err() {
        Error::Toml { context, .. } => assert!(context.ends_with(CONFIG_FILE)),
        other => panic!("unexpected error: {}", other),
    }
}
