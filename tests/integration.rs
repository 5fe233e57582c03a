use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;
use transync::cli::{ApplyArgs, AutoArgs, EventsArgs, StatusArgs, SyncArgs, WorkspaceArgs};
use transync::journal::{EventRecord, EventStore};
use transync::model::Task;
use transync::translator::{
    TranslationReply, TranslationRequest, Translator, TranslatorError, UsageReceipt,
};

const PLAN_SVG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
  <title>Plan</title>
  <rect class="wall" x="0" y="0" width="100" height="10"/>
  <text x="10" y="20">Wall</text>
</svg>
"#;

const NOTES_MD: &str = "# Floor plan\n\nThe wall is load-bearing.\n\n```\nwall --check\n```\n";

fn create_workspace(root: &Path, rename_rules: serde_json::Value) -> Result<()> {
    fs::create_dir_all(root.join("drawings/en/floor"))?;
    fs::write(root.join("drawings/en/floor/plan.svg"), PLAN_SVG)?;
    fs::write(root.join("drawings/en/notes.md"), NOTES_MD)?;
    fs::write(root.join("drawings/en/logo.png"), [0x89u8, b'P', b'N', b'G'])?;
    let config = json!({
        "source": { "language": "en", "folder": "drawings/en" },
        "targets": [
            {
                "language": "th",
                "language_name": "Thai",
                "folder": "drawings/th",
                "rename_rules": rename_rules,
                "translation_notes": ["Use formal register"]
            }
        ],
        "translation": { "terminology": { "Wall": "ผนัง" } }
    });
    fs::write(root.join("translate.json"), config.to_string())?;
    Ok(())
}

fn workspace(root: &Path) -> WorkspaceArgs {
    WorkspaceArgs {
        root: Some(root.to_path_buf()),
        config: None,
    }
}

fn sync_args() -> SyncArgs {
    SyncArgs {
        target: None,
        dry_run: false,
        json: false,
    }
}

fn apply_args(task: &str) -> ApplyArgs {
    ApplyArgs {
        task: PathBuf::from(task),
        dry_run: false,
        json: false,
    }
}

fn auto_args(apply: bool) -> AutoArgs {
    AutoArgs {
        task: PathBuf::from("th"),
        api_key: None,
        model: None,
        timeout: Duration::from_secs(5),
        apply,
        json: false,
    }
}

fn task_file(root: &Path) -> PathBuf {
    root.join("tasks/translate-th.json")
}

fn load_task(root: &Path) -> Result<Task> {
    Ok(serde_json::from_str(&fs::read_to_string(task_file(root))?)?)
}

fn save_task(root: &Path, task: &Task) -> Result<()> {
    fs::write(task_file(root), serde_json::to_string_pretty(task)?)?;
    Ok(())
}

fn fill(task: &mut Task, source_text: &str, target_text: &str) {
    for file in &mut task.files {
        for extraction in &mut file.extractions {
            if extraction.source_text == source_text {
                extraction.target_text = target_text.to_string();
            }
        }
    }
}

fn events(root: &Path) -> Result<Vec<EventRecord>> {
    Ok(EventStore::read_all(&root.join(".transync"))?)
}

fn types_of_last_session(records: &[EventRecord]) -> Vec<String> {
    let Some(last) = records.last().and_then(|r| r.session_id.clone()) else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.session_id.as_ref() == Some(&last))
        .map(|r| r.event_type.clone())
        .collect()
}

#[test]
fn test_sync_then_apply_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;

    let exit_code = transync::engine::sync(&workspace(root), sync_args())?;
    assert_eq!(exit_code, 0);

    assert_eq!(fs::read_to_string(root.join("drawings/th/floor/plan.svg"))?, PLAN_SVG);
    assert_eq!(
        fs::read(root.join("drawings/th/logo.png"))?,
        fs::read(root.join("drawings/en/logo.png"))?
    );

    let mut task = load_task(root)?;
    assert_eq!(task.target_language, "th");
    assert_eq!(task.translation_notes, vec!["Use formal register"]);
    let plan = task
        .files
        .iter()
        .find(|f| f.target == "drawings/th/floor/plan.svg")
        .expect("plan.svg in task");
    assert_eq!(plan.source, "drawings/en/floor/plan.svg");
    let texts: Vec<&str> = plan.extractions.iter().map(|e| e.source_text.as_str()).collect();
    assert_eq!(texts, vec!["Plan", "Wall"]);
    assert_eq!(task.stats().total_extractions, 4);

    fill(&mut task, "Plan", "แปลน");
    fill(&mut task, "Wall", "ผนัง");
    fill(&mut task, "# Floor plan", "# แปลนพื้น");
    fill(&mut task, "The wall is load-bearing.", "ผนังนี้รับน้ำหนัก");
    save_task(root, &task)?;

    let exit_code = transync::engine::apply(&workspace(root), apply_args("th"))?;
    assert_eq!(exit_code, 0);

    let svg = fs::read_to_string(root.join("drawings/th/floor/plan.svg"))?;
    assert!(svg.contains(">ผนัง<"));
    assert!(svg.contains("<title>แปลน</title>"));
    assert!(svg.contains(r#"<rect class="wall""#));
    assert_eq!(
        fs::read_to_string(root.join("drawings/th/notes.md"))?,
        "# แปลนพื้น\n\nผนังนี้รับน้ำหนัก\n\n```\nwall --check\n```\n"
    );
    assert_eq!(fs::read_to_string(root.join("drawings/en/floor/plan.svg"))?, PLAN_SVG);
    assert!(!task_file(root).exists());

    let types = types_of_last_session(&events(root)?);
    assert_eq!(types.first().map(String::as_str), Some("ConfigLoaded"));
    assert!(types.contains(&"TaskLoaded".to_string()));
    assert_eq!(types.iter().filter(|t| *t == "TranslationApplied").count(), 2);
    assert_eq!(types.last().map(String::as_str), Some("TaskDeleted"));
    Ok(())
}

#[test]
fn test_second_sync_is_a_no_op_and_keeps_translations() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;

    transync::engine::sync(&workspace(root), sync_args())?;
    let mut task = load_task(root)?;
    fill(&mut task, "Wall", "ผนัง");
    save_task(root, &task)?;

    let exit_code = transync::engine::sync(&workspace(root), sync_args())?;
    assert_eq!(exit_code, 0);

    let types = types_of_last_session(&events(root)?);
    assert!(!types.iter().any(|t| t == "FileCopied" || t == "FileDeleted"), "{types:?}");
    assert_eq!(load_task(root)?.stats().filled_extractions, 1);
    Ok(())
}

#[test]
fn test_rename_rules_and_orphans() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({ ".md": ".th.md" }))?;
    fs::create_dir_all(root.join("drawings/th/retired"))?;
    fs::write(root.join("drawings/th/retired/old.svg"), "<svg/>")?;
    fs::write(root.join("drawings/th/notes.md"), "stale name")?;

    transync::engine::sync(&workspace(root), sync_args())?;

    assert!(root.join("drawings/th/notes.th.md").is_file());
    assert!(!root.join("drawings/th/notes.md").exists());
    assert!(!root.join("drawings/th/retired").exists());

    let task = load_task(root)?;
    let notes = task
        .files
        .iter()
        .find(|f| f.source == "drawings/en/notes.md")
        .expect("notes.md in task");
    assert_eq!(notes.target, "drawings/th/notes.th.md");

    let deleted: Vec<String> = events(root)?
        .into_iter()
        .filter(|r| r.event_type == "FileDeleted")
        .map(|r| r.raw["path"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(deleted, vec!["drawings/th/notes.md", "drawings/th/retired"]);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_aborted_sync_resumes_task() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    // Sorts after every other source file, so earlier copies succeed first.
    let dangling = root.join("drawings/en/zz.svg");
    std::os::unix::fs::symlink(root.join("missing.svg"), &dangling)?;

    let err = transync::engine::sync(&workspace(root), sync_args()).unwrap_err();
    assert_eq!(transync::exit_codes::for_error(&err), 1);
    assert_eq!(format!("{err:#}").matches("source not found").count(), 1);
    assert!(root.join("drawings/th/floor/plan.svg").is_file());
    assert!(!task_file(root).exists());

    fs::remove_file(&dangling)?;
    let exit_code = transync::engine::sync(&workspace(root), sync_args())?;
    assert_eq!(exit_code, 0);

    let task = load_task(root)?;
    let mut targets: Vec<&str> = task.files.iter().map(|f| f.target.as_str()).collect();
    targets.sort();
    assert_eq!(targets, vec!["drawings/th/floor/plan.svg", "drawings/th/notes.md"]);
    assert_eq!(task.stats().total_extractions, 4);
    Ok(())
}

#[test]
fn test_dry_run_touches_nothing() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;

    let args = SyncArgs {
        dry_run: true,
        ..sync_args()
    };
    let exit_code = transync::engine::sync(&workspace(root), args)?;
    assert_eq!(exit_code, 0);
    assert!(!root.join("drawings/th").exists());
    assert!(!root.join("tasks").exists());
    assert!(!root.join(".transync").exists());
    Ok(())
}

#[test]
fn test_partial_apply_keeps_task() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;

    let mut task = load_task(root)?;
    fill(&mut task, "The wall is load-bearing.", "ผนังนี้รับน้ำหนัก");
    save_task(root, &task)?;

    let exit_code = transync::engine::apply(&workspace(root), apply_args("tasks/translate-th.json"))?;
    assert_eq!(exit_code, 4);
    assert!(task_file(root).exists());
    assert_eq!(
        fs::read_to_string(root.join("drawings/th/notes.md"))?,
        "# Floor plan\n\nผนังนี้รับน้ำหนัก\n\n```\nwall --check\n```\n"
    );
    assert_eq!(fs::read_to_string(root.join("drawings/th/floor/plan.svg"))?, PLAN_SVG);

    // Re-applying the same task is harmless.
    let exit_code = transync::engine::apply(&workspace(root), apply_args("th"))?;
    assert_eq!(exit_code, 4);
    assert_eq!(
        fs::read_to_string(root.join("drawings/th/notes.md"))?,
        "# Floor plan\n\nผนังนี้รับน้ำหนัก\n\n```\nwall --check\n```\n"
    );
    Ok(())
}

#[test]
fn test_edited_target_line_keeps_task() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;

    let edited = "# Floor plan\n\nThe wall is NOT load-bearing.\n\n```\nwall --check\n```\n";
    fs::write(root.join("drawings/th/notes.md"), edited)?;
    let mut task = load_task(root)?;
    fill(&mut task, "Plan", "แปลน");
    fill(&mut task, "Wall", "ผนัง");
    fill(&mut task, "# Floor plan", "# แปลนพื้น");
    fill(&mut task, "The wall is load-bearing.", "ผนังนี้รับน้ำหนัก");
    save_task(root, &task)?;

    let exit_code = transync::engine::apply(&workspace(root), apply_args("th"))?;
    assert_eq!(exit_code, 4);
    assert!(task_file(root).exists());
    assert_eq!(
        fs::read_to_string(root.join("drawings/th/notes.md"))?,
        "# แปลนพื้น\n\nThe wall is NOT load-bearing.\n\n```\nwall --check\n```\n"
    );
    assert!(fs::read_to_string(root.join("drawings/th/floor/plan.svg"))?.contains(">ผนัง<"));
    Ok(())
}

#[test]
fn test_nothing_to_apply() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;

    let exit_code = transync::engine::apply(&workspace(root), apply_args("th"))?;
    assert_eq!(exit_code, 3);
    assert!(task_file(root).exists());
    Ok(())
}

#[test]
fn test_unknown_target_is_a_config_error() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;

    let args = SyncArgs {
        target: Some("de".to_string()),
        ..sync_args()
    };
    let err = transync::engine::sync(&workspace(root), args).unwrap_err();
    assert_eq!(transync::exit_codes::for_error(&err), 2);
    assert!(!root.join("drawings/th").exists());
    Ok(())
}

struct Dictionary(BTreeMap<&'static str, &'static str>);

impl Translator for Dictionary {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn translate(
        &self,
        request: &TranslationRequest,
    ) -> std::result::Result<TranslationReply, TranslatorError> {
        assert_eq!(request.terminology.get("Wall").map(String::as_str), Some("ผนัง"));
        let translations = request
            .items
            .iter()
            .filter_map(|item| {
                self.0
                    .get(item.source_text.as_str())
                    .map(|t| (item.id, t.to_string()))
            })
            .collect();
        Ok(TranslationReply {
            translations,
            usage: UsageReceipt::priced(1200, 300, 3.0, 15.0),
        })
    }
}

struct Offline;

impl Translator for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn translate(
        &self,
        _request: &TranslationRequest,
    ) -> std::result::Result<TranslationReply, TranslatorError> {
        Err(TranslatorError::Transport("connection refused".to_string()))
    }
}

fn full_dictionary() -> Dictionary {
    Dictionary(BTreeMap::from([
        ("Plan", "แปลน"),
        ("Wall", "ผนัง"),
        ("# Floor plan", "# แปลนพื้น"),
        ("The wall is load-bearing.", "ผนังนี้รับน้ำหนัก"),
    ]))
}

#[test]
fn test_auto_translate_then_apply() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;

    let exit_code = transync::engine::auto_with(&workspace(root), auto_args(true), &full_dictionary())?;
    assert_eq!(exit_code, 0);
    assert!(!task_file(root).exists());
    assert!(fs::read_to_string(root.join("drawings/th/floor/plan.svg"))?.contains(">ผนัง<"));

    let records = events(root)?;
    let completed = records
        .iter()
        .find(|r| r.event_type == "TranslationCompleted")
        .expect("completion event");
    assert_eq!(completed.raw["items_translated"], 4);
    assert_eq!(completed.raw["input_tokens"], 1200);
    assert_eq!(completed.raw["model"], "dictionary");
    let types = types_of_last_session(&records);
    assert!(types.contains(&"TranslationStarted".to_string()));
    assert!(types.contains(&"TaskDeleted".to_string()));
    Ok(())
}

#[test]
fn test_auto_partial_and_nothing_left() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;

    let partial = Dictionary(BTreeMap::from([("Wall", "ผนัง")]));
    let exit_code = transync::engine::auto_with(&workspace(root), auto_args(false), &partial)?;
    assert_eq!(exit_code, 4);
    assert_eq!(load_task(root)?.stats().filled_extractions, 1);

    transync::engine::auto_with(&workspace(root), auto_args(false), &full_dictionary())?;
    let exit_code = transync::engine::auto_with(&workspace(root), auto_args(false), &full_dictionary())?;
    assert_eq!(exit_code, 3);
    Ok(())
}

#[test]
fn test_auto_failure_leaves_task_untouched() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;
    let before = fs::read_to_string(task_file(root))?;

    let err = transync::engine::auto_with(&workspace(root), auto_args(false), &Offline).unwrap_err();
    assert!(format!("{err:#}").contains("connection refused"));
    assert_eq!(transync::exit_codes::for_error(&err), 1);
    assert_eq!(fs::read_to_string(task_file(root))?, before);

    let failed = events(root)?
        .into_iter()
        .find(|r| r.event_type == "TranslationFailed")
        .expect("failure event");
    assert_eq!(failed.raw["model"], "offline");
    Ok(())
}

#[test]
fn test_status_and_events_commands() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;
    transync::engine::sync(&workspace(root), sync_args())?;

    let status = StatusArgs {
        task: PathBuf::from("th"),
        json: false,
    };
    assert_eq!(transync::engine::status(&workspace(root), status)?, 0);

    let before = events(root)?.len();
    let list = EventsArgs {
        since: Some(Duration::from_secs(3600)),
        ..EventsArgs::default()
    };
    assert_eq!(transync::engine::events(&workspace(root), list)?, 0);
    assert_eq!(events(root)?.len(), before, "read-only commands record nothing");

    let clear = EventsArgs {
        clear: true,
        yes: true,
        ..EventsArgs::default()
    };
    assert_eq!(transync::engine::events(&workspace(root), clear)?, 0);
    assert!(events(root)?.is_empty());
    Ok(())
}

#[test]
fn test_json_output() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    create_workspace(root, json!({}))?;

    let output = Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["sync", "--json"])
        .env("RUST_LOG", "off")
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let reports: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["type"], "sync");
    assert_eq!(reports[0]["target"], "th");
    assert_eq!(reports[0]["summary"]["files_copied"], 3);
    assert_eq!(reports[0]["task"]["total_extractions"], 4);

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["status", "th", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"percent_complete\":0"));

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["events", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\":\"FileCopied\""));
    Ok(())
}

#[test]
fn test_cli_exit_codes() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();

    // No configuration yet.
    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .arg("sync")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("translate.json"));

    create_workspace(root, json!({}))?;
    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .arg("sync")
        .assert()
        .success();

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["apply", "th"])
        .assert()
        .code(3);

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["apply", "th", "--json"])
        .env("RUST_LOG", "off")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("\"type\":\"nothing_to_do\""))
        .stdout(predicate::str::contains("\"reason\":\"no_translations\""));

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["events", "--clear"])
        .assert()
        .failure();
    assert!(root.join(".transync/events.jsonl").exists());

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("--root")
        .arg(root)
        .args(["auto", "th"])
        .env_remove("ANTHROPIC_API_KEY")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("API key"));

    Command::new(env!("CARGO_BIN_EXE_transync"))
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("source_text"));
    Ok(())
}
