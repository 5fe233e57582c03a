use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use path_absolutize::Absolutize;

use crate::apply;
use crate::claude::{self, ClaudeConfig, ClaudeTranslator};
use crate::cli::{ApplyArgs, AutoArgs, EventsArgs, StatusArgs, SyncArgs, WorkspaceArgs};
use crate::config::{self, CONFIG_FILE, Config, TargetConfig};
use crate::diff::{self, DiffRequest};
use crate::error::TranslateError;
use crate::events::{Event, SessionId};
use crate::exit_codes::exit;
use crate::journal::{EventSink, EventStore};
use crate::model::{self, Task};
use crate::reporter::{
    ApplyOutcome, AutoReport, FileStatus, NothingToDo, PlanCounts, Reporter, StatusReport,
    SyncReport,
};
use crate::resolve::relative_string;
use crate::sync::SyncExecutor;
use crate::task;
use crate::translator::{self, Translator};

/// Loaded configuration plus the event sink of this invocation.
pub struct Workspace {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub sink: EventSink,
}

impl Workspace {
    /// Resolve root and configuration. With `record`, events go to the log.
    pub fn open(args: &WorkspaceArgs, record: bool) -> Result<Self> {
        let root = match &args.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("failed to read current directory")?,
        };
        let root = root
            .absolutize()
            .with_context(|| format!("invalid root {}", root.display()))?
            .into_owned();
        let config_path = match &args.config {
            Some(path) => path
                .absolutize()
                .with_context(|| format!("invalid config path {}", path.display()))?
                .into_owned(),
            None => root.join(CONFIG_FILE),
        };
        let config = config::load(&config_path)?;

        let session = SessionId::generate();
        let sink = if record {
            EventSink::open_or_disabled(&config.events_dir(&root), session)
        } else {
            EventSink::disabled(session)
        };
        sink.emit(Event::ConfigLoaded {
            config_path: display(&root, &config_path),
            source_language: config.source.language.clone(),
            target_count: config.targets.len(),
        });
        tracing::debug!(event = "workspace_opened", root = %root.display(), session = %sink.session());
        Ok(Self {
            root,
            config_path,
            config,
            sink,
        })
    }

    /// A task argument is either a target language code or a path
    /// (relative paths resolve against the root).
    pub fn task_path(&self, arg: &Path) -> PathBuf {
        let text = arg.to_string_lossy();
        if arg.components().count() == 1
            && arg.extension().is_none()
            && self.config.target(&text).is_some()
        {
            return task::task_path(&self.config.tasks_dir(&self.root), &text);
        }
        if arg.is_absolute() {
            arg.to_path_buf()
        } else {
            self.root.join(arg)
        }
    }

    fn display(&self, path: &Path) -> String {
        display(&self.root, path)
    }

    fn load_task(&self, path: &Path) -> Result<Task> {
        let task = task::load(path).with_context(|| format!("failed to load task {}", path.display()))?;
        let stats = task.stats();
        self.sink.emit(Event::TaskLoaded {
            task_file: self.display(path),
            target_language: task.target_language.clone(),
            file_count: stats.total_files,
            extraction_count: stats.total_extractions,
            filled_count: stats.filled_extractions,
        });
        Ok(task)
    }
}

fn display(root: &Path, path: &Path) -> String {
    relative_string(root, path).unwrap_or_else(|| path.display().to_string())
}

pub fn sync(workspace: &WorkspaceArgs, args: SyncArgs) -> Result<i32> {
    let ws = Workspace::open(workspace, !args.dry_run)?;
    let mut reporter = Reporter::new(args.json);

    let targets: Vec<&TargetConfig> = match &args.target {
        Some(language) => vec![ws.config.target(language).ok_or_else(|| {
            TranslateError::config(&ws.config_path, format!("unknown target language '{language}'"))
        })?],
        None => ws.config.targets.iter().collect(),
    };
    let source_root = ws.config.source_root(&ws.root);

    for target in targets {
        let target_root = target.target_root(&ws.root);
        let is_translatable = |path: &Path| ws.config.is_translatable(path);
        let actions = diff::plan(&DiffRequest {
            source_root: &source_root,
            target_root: &target_root,
            rename_rules: &target.rename_rules,
            is_translatable: &is_translatable,
        })
        .with_context(|| format!("failed to plan sync for '{}'", target.language))?;
        let planned = PlanCounts::of(&actions);

        if args.dry_run {
            reporter.record(&SyncReport {
                target: target.language.clone(),
                dry_run: true,
                planned,
                actions,
                summary: None,
                task_file: None,
                task: None,
                extraction_failures: 0,
            });
            continue;
        }

        let summary = SyncExecutor::new(&ws.root, &ws.sink)
            .run(&actions)
            .with_context(|| format!("sync to '{}' aborted", target.language))?;
        let update = task::refresh(
            &ws.root,
            &ws.config,
            target,
            &summary.copied_documents,
            &ws.sink,
        )
        .with_context(|| format!("failed to update task for '{}'", target.language))?;
        tracing::info!(
            event = "target_synced",
            target = %target.language,
            copied = summary.files_copied,
            deleted = summary.files_deleted
        );

        reporter.record(&SyncReport {
            target: target.language.clone(),
            dry_run: false,
            planned,
            actions: Vec::new(),
            task_file: update.task.as_ref().map(|_| ws.display(&update.path)),
            task: update.task.as_ref().map(Task::stats),
            extraction_failures: update.extraction_failures.len(),
            summary: Some(summary),
        });
    }
    Ok(exit::SUCCESS)
}

pub fn apply(workspace: &WorkspaceArgs, args: ApplyArgs) -> Result<i32> {
    let ws = Workspace::open(workspace, !args.dry_run)?;
    let mut reporter = Reporter::new(args.json);
    let path = ws.task_path(&args.task);
    let task = ws.load_task(&path)?;
    apply_loaded(&ws, &path, &task, args.dry_run, &mut reporter)
}

/// Apply a loaded task and delete it once complete.
fn apply_loaded(
    ws: &Workspace,
    path: &Path,
    task: &Task,
    dry_run: bool,
    reporter: &mut Reporter,
) -> Result<i32> {
    let report = match apply::apply_task(&ws.root, path, task, &ws.sink, dry_run) {
        Ok(report) => report,
        Err(TranslateError::NothingToApply { path }) => {
            reporter.record(&NothingToDo {
                task_file: ws.display(&path),
                reason: NothingToDo::NO_TRANSLATIONS,
            });
            return Ok(exit::NOTHING_TO_DO);
        }
        Err(e) => return Err(e).context("failed to apply task"),
    };

    let complete = report.is_complete();
    let task_deleted = complete && !dry_run && task::delete(path);
    if task_deleted {
        ws.sink.emit(Event::TaskDeleted {
            task_file: ws.display(path),
            reason: "all_translations_applied".to_string(),
        });
    }
    reporter.record(&ApplyOutcome {
        task_file: ws.display(path),
        dry_run,
        report,
        task_deleted,
    });
    Ok(if complete { exit::SUCCESS } else { exit::PARTIAL })
}

pub fn auto(workspace: &WorkspaceArgs, args: AutoArgs) -> Result<i32> {
    let ws = Workspace::open(workspace, true)?;
    let api_key = args.api_key.clone().unwrap_or_default();
    if api_key.trim().is_empty() {
        return Err(TranslateError::config(
            &ws.config_path,
            format!("no API key: pass --api-key or set {}", claude::API_KEY_ENV),
        )
        .into());
    }
    let model = args
        .model
        .clone()
        .or_else(|| ws.config.translation.model.clone())
        .unwrap_or_else(|| claude::DEFAULT_MODEL.to_string());
    let translator = ClaudeTranslator::new(ClaudeConfig {
        model,
        timeout: args.timeout,
        ..ClaudeConfig::new(api_key)
    })
    .map_err(|e| TranslateError::ExternalCapability(e.to_string()))?;
    run_auto(&ws, &args, &translator)
}

/// `auto` against any translator.
pub fn auto_with(workspace: &WorkspaceArgs, args: AutoArgs, translator: &dyn Translator) -> Result<i32> {
    let ws = Workspace::open(workspace, true)?;
    run_auto(&ws, &args, translator)
}

fn run_auto(ws: &Workspace, args: &AutoArgs, translator: &dyn Translator) -> Result<i32> {
    let mut reporter = Reporter::new(args.json);
    let path = ws.task_path(&args.task);
    let mut task = ws.load_task(&path)?;
    let pending = task.stats().empty_extractions();
    if pending == 0 {
        reporter.record(&NothingToDo {
            task_file: ws.display(&path),
            reason: NothingToDo::ALL_FILLED,
        });
        return Ok(exit::NOTHING_TO_DO);
    }

    let task_file = ws.display(&path);
    ws.sink.emit(Event::TranslationStarted {
        task_file: task_file.clone(),
        items_count: pending,
        model: translator.name().to_string(),
    });
    let started = Instant::now();
    let outcome = match translator::auto_translate(&mut task, translator, &ws.config.translation) {
        Ok(outcome) => outcome,
        Err(e) => {
            ws.sink.emit(Event::TranslationFailed {
                task_file,
                error: e.to_string(),
                model: translator.name().to_string(),
            });
            return Err(e).context("automatic translation failed");
        }
    };
    let elapsed = started.elapsed().as_secs_f64();

    task::save(&path, &task).with_context(|| format!("failed to save task {}", path.display()))?;
    ws.sink.emit(Event::TranslationCompleted {
        task_file: task_file.clone(),
        items_translated: outcome.filled,
        input_tokens: outcome.receipt.input_tokens,
        output_tokens: outcome.receipt.output_tokens,
        cost_usd: outcome.receipt.estimated_cost_usd,
        duration_seconds: elapsed,
        model: translator.name().to_string(),
    });
    reporter.record(&AutoReport {
        task_file,
        model: translator.name().to_string(),
        requested: outcome.requested,
        filled: outcome.filled,
        usage: outcome.receipt,
        duration_seconds: elapsed,
    });

    if args.apply {
        return apply_loaded(ws, &path, &task, false, &mut reporter);
    }
    Ok(if outcome.filled == outcome.requested {
        exit::SUCCESS
    } else {
        exit::PARTIAL
    })
}

pub fn status(workspace: &WorkspaceArgs, args: StatusArgs) -> Result<i32> {
    let ws = Workspace::open(workspace, false)?;
    let mut reporter = Reporter::new(args.json);
    let path = ws.task_path(&args.task);
    let task = ws.load_task(&path)?;
    let stats = task.stats();
    reporter.record(&StatusReport {
        task_file: ws.display(&path),
        target_language: task.target_language.clone(),
        language_name: task.language_name.clone(),
        percent_complete: stats.percent_complete(),
        stats,
        files: task
            .files
            .iter()
            .map(|f| FileStatus {
                target: f.target.clone(),
                kind: f.kind.as_str(),
                total: f.extractions.len(),
                filled: f.filled_count(),
            })
            .collect(),
    });
    Ok(exit::SUCCESS)
}

pub fn events(workspace: &WorkspaceArgs, args: EventsArgs) -> Result<i32> {
    let ws = Workspace::open(workspace, false)?;
    let dir = ws.config.events_dir(&ws.root);
    let mut reporter = Reporter::new(args.json);

    if args.clear {
        let removed = EventStore::clear(&dir).context("failed to clear event log")?;
        tracing::info!(event = "event_log_cleared", removed);
        reporter.note(if removed {
            "Event log cleared"
        } else {
            "Event log was already empty"
        });
        return Ok(exit::SUCCESS);
    }

    let since = match args.since {
        Some(age) => Some(
            chrono::Utc::now()
                - chrono::Duration::from_std(age).context("--since is out of range")?,
        ),
        None => None,
    };
    let records = match (&args.session, since) {
        (Some(session), since) => {
            let mut records = EventStore::read_session(&dir, &SessionId::from(session.as_str()))?;
            if let Some(since) = since {
                records.retain(|r| r.timestamp >= since);
            }
            records
        }
        (None, Some(since)) => EventStore::read_since(&dir, since)?,
        (None, None) => EventStore::read_all(&dir)?,
    };
    if records.is_empty() {
        reporter.note("No events recorded");
    }
    reporter.events(&records);
    Ok(exit::SUCCESS)
}

pub fn schema() -> Result<i32> {
    println!("{}", model::generate_schema());
    Ok(exit::SUCCESS)
}
