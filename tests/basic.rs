use anyhow::Result;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_loading() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("translate.json");
    // Raw text: rule order in the file is significant.
    let config = r#"{
        "source": { "language": "en", "folder": "drawings/en" },
        "targets": [
            {
                "language": "th",
                "language_name": "Thai",
                "folder": "drawings/th",
                "rename_rules": { ".svg": ".th.svg", ".md": ".th.md" }
            }
        ],
        "paths": { "tasks": "work/tasks" }
    }"#;
    fs::write(&config_path, config)?;

    let config = transync::config::load(&config_path)?;
    let rules: Vec<&str> = config.targets[0]
        .rename_rules
        .iter()
        .map(|r| r.from.as_str())
        .collect();
    assert_eq!(rules, vec![".svg", ".md"]);
    assert_eq!(
        config.tasks_dir(dir.path()),
        dir.path().join("work/tasks")
    );
    assert_eq!(config.events_dir(dir.path()), dir.path().join(".transync"));
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("translate.json");
    fs::write(&config_path, json!({ "source": { "language": "en", "folder": "en" }, "targets": [] }).to_string())?;
    let err = transync::config::load(&config_path).unwrap_err();
    assert!(matches!(err, transync::TranslateError::Config { .. }));
    Ok(())
}

#[test]
fn test_schema_generation() {
    let schema = transync::model::generate_schema();
    assert!(schema.contains("$schema"));
    assert!(schema.contains("Task"));
    assert!(schema.contains("target_text"));
}
