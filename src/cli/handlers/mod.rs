use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use flexi_logger::LoggerHandle;
use log::info;

use crate::app::App;
use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io::{self, resolve_path};
use crate::io::store::{JsonFileStore, MirroredStore};
use crate::io::watcher::RemoteWatcher;
use crate::logging;
use crate::model::config::AppConfig;
use crate::model::dates::parse_date_input;
use crate::model::task::{NewTask, Priority, RepeatType, TaskPatch};
use crate::ops::filter::{FilterCriteria, StatusFilter};

type Store = MirroredStore<JsonFileStore, JsonFileStore>;
type CmdResult = Result<(), Box<dyn Error>>;

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "GTD_DIR";

/// Everything a command needs besides its own arguments
struct Context {
    data_dir: PathBuf,
    config: AppConfig,
    json: bool,
    _logger: LoggerHandle,
}

impl Context {
    /// Open the task list, refusing to work on a collection that could not
    /// be loaded.
    fn open_app(&self) -> Result<App<Store>, String> {
        let app = self.load_app();
        if let Some(reason) = app.load_error() {
            return Err(format!(
                "{} (nothing was changed; fix the file or replace it with `gtd import`)",
                reason
            ));
        }
        Ok(app)
    }

    fn load_app(&self) -> App<Store> {
        let local = JsonFileStore::new(self.data_dir.join(&self.config.storage.file));
        let remote = self.remote_path().map(JsonFileStore::new);
        App::open(
            MirroredStore::new(local, remote),
            self.config.features.recurrence,
            Utc::now(),
        )
    }

    fn remote_path(&self) -> Option<PathBuf> {
        self.config
            .storage
            .remote
            .as_deref()
            .map(|p| resolve_path(&self.data_dir, p))
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    fs::create_dir_all(&data_dir)
        .map_err(|e| format!("cannot create data directory {}: {}", data_dir.display(), e))?;
    let config = config_io::read_config(&data_dir)?;
    let log_dir = config.log.dir.as_deref().map(|d| resolve_path(&data_dir, d));
    let logger = logging::init_logging(&config.log.level, log_dir.as_deref())?;

    let ctx = Context {
        data_dir,
        config,
        json: cli.json,
        _logger: logger,
    };

    match cli.command {
        // Read commands
        Commands::List(args) => cmd_list(&ctx, args),
        Commands::Show(args) => cmd_show(&ctx, args),
        Commands::Stats => cmd_stats(&ctx),
        Commands::Export(args) => cmd_export(&ctx, args),

        // Write commands
        Commands::Add(args) => cmd_add(&ctx, args),
        Commands::Sub(args) => cmd_sub(&ctx, args),
        Commands::Rm(args) => cmd_rm(&ctx, args),
        Commands::Edit(args) => cmd_edit(&ctx, args),
        Commands::Done(args) => cmd_done(&ctx, args),
        Commands::Archive(args) => cmd_archive(&ctx, args),
        Commands::Import(args) => cmd_import(&ctx, args),
        Commands::ClearCompleted => cmd_clear_completed(&ctx),

        // Sync
        Commands::Watch => cmd_watch(&ctx),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `--data-dir`, then `$GTD_DIR`, then `~/.gtd`.
fn resolve_data_dir(flag: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(".gtd"))
        .ok_or_else(|| format!("cannot find a data directory: pass --data-dir or set {}", DATA_DIR_ENV))
}

fn parse_priority_arg(s: &str) -> Result<Priority, String> {
    Priority::parse_priority(s)
        .ok_or_else(|| format!("unknown priority '{}' (expected: urgent, high, medium, low)", s))
}

fn parse_repeat_arg(s: &str) -> Result<RepeatType, String> {
    RepeatType::parse_repeat(s)
        .ok_or_else(|| format!("unknown repeat '{}' (expected: none, daily, weekly, monthly)", s))
}

fn parse_status_arg(s: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse_status(s).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected: completed, pending, overdue, due-soon)",
            s
        )
    })
}

fn parse_date_arg(s: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    parse_date_input(s, end_of_day)
        .ok_or_else(|| format!("invalid date '{}' (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM)", s))
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_mutation(ctx: &Context, result: MutationJson, text: String) -> CmdResult {
    if ctx.json {
        print_json(&result)
    } else {
        println!("{}", text);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: ListArgs) -> CmdResult {
    let criteria = FilterCriteria {
        search: args.search.unwrap_or_default(),
        status: args
            .status
            .as_deref()
            .map(parse_status_arg)
            .transpose()?
            .unwrap_or_default(),
        priority: args.priority.as_deref().map(parse_priority_arg).transpose()?,
    };

    let app = ctx.open_app()?;
    let now = Utc::now();
    let view = app.view(&criteria, now);

    if ctx.json {
        let tasks: Vec<TaskJson> = view.iter().map(|t| task_to_json(t, now)).collect();
        return print_json(&tasks);
    }
    if view.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in view {
        for line in format_task_tree(task, 0, now) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(ctx: &Context, args: IdArgs) -> CmdResult {
    let app = ctx.open_app()?;
    let id = app.resolve(&args.id)?;
    let task = app
        .find(&id)
        .ok_or_else(|| format!("task not found: {}", args.id))?;
    let now = Utc::now();

    if ctx.json {
        return print_json(&task_to_json(task, now));
    }
    for line in format_task_detail(task, now) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_stats(ctx: &Context) -> CmdResult {
    let app = ctx.open_app()?;
    let stats = app.statistics(Utc::now());
    if ctx.json {
        return print_json(&stats_to_json(stats, app.sync_status()));
    }
    for line in format_stats(&stats, app.sync_status()) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_export(ctx: &Context, args: ExportArgs) -> CmdResult {
    let app = ctx.open_app()?;
    let csv = app.export_csv(&Local);
    match args.output {
        Some(path) => {
            fs::write(&path, csv)
                .map_err(|e| format!("could not write {}: {}", path.display(), e))?;
            println!("exported {} tasks to {}", app.flatten().len(), path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &Context, args: AddArgs) -> CmdResult {
    let mut draft = NewTask::new(args.text);
    if let Some(p) = args.priority.as_deref() {
        draft.priority = parse_priority_arg(p)?;
    }
    draft.due_date = args.due.as_deref().map(|d| parse_date_arg(d, false)).transpose()?;
    draft.notes = args.notes.unwrap_or_default();
    draft.tags = args.tag;
    draft.progress = args.progress.unwrap_or(0);
    if let Some(r) = args.repeat.as_deref() {
        draft.repeat_type = parse_repeat_arg(r)?;
    }
    draft.repeat_until = args.until.as_deref().map(|d| parse_date_arg(d, true)).transpose()?;

    let mut app = ctx.open_app()?;
    let id = app.add(draft, Utc::now())?;
    let result = MutationJson {
        id: id.clone(),
        completed: None,
        archived: None,
        spawned: None,
    };
    print_mutation(ctx, result, id)
}

fn cmd_sub(ctx: &Context, args: SubArgs) -> CmdResult {
    let mut app = ctx.open_app()?;
    let parent = app.resolve(&args.id)?;
    let id = app.add_subtask(&parent, &args.text, Utc::now())?;
    let result = MutationJson {
        id: id.clone(),
        completed: None,
        archived: None,
        spawned: None,
    };
    print_mutation(ctx, result, id)
}

fn cmd_rm(ctx: &Context, args: IdArgs) -> CmdResult {
    let mut app = ctx.open_app()?;
    let id = app.resolve(&args.id)?;
    let removed = app.remove(&id)?;
    let result = MutationJson {
        id: removed.id.clone(),
        completed: None,
        archived: None,
        spawned: None,
    };
    print_mutation(ctx, result, format!("removed {} {}", short_id(&removed.id), removed.text))
}

fn cmd_edit(ctx: &Context, args: EditArgs) -> CmdResult {
    let mut patch = TaskPatch {
        text: args.text,
        notes: args.notes,
        progress: args.progress,
        ..Default::default()
    };
    if let Some(p) = args.priority.as_deref() {
        patch.priority = Some(parse_priority_arg(p)?);
    }
    if args.clear_due {
        patch.due_date = Some(None);
    } else if let Some(d) = args.due.as_deref() {
        patch.due_date = Some(Some(parse_date_arg(d, false)?));
    }
    if args.clear_tags {
        patch.tags = Some(Vec::new());
    } else if !args.tag.is_empty() {
        patch.tags = Some(args.tag);
    }
    if let Some(r) = args.repeat.as_deref() {
        patch.repeat_type = Some(parse_repeat_arg(r)?);
    }
    if args.clear_until {
        patch.repeat_until = Some(None);
    } else if let Some(d) = args.until.as_deref() {
        patch.repeat_until = Some(Some(parse_date_arg(d, true)?));
    }
    if patch.is_empty() {
        return Err("nothing to change (see `gtd edit --help`)".into());
    }

    let mut app = ctx.open_app()?;
    let id = app.resolve(&args.id)?;
    app.update(&id, patch)?;
    let result = MutationJson {
        id: id.clone(),
        completed: None,
        archived: None,
        spawned: None,
    };
    print_mutation(ctx, result, format!("updated {}", short_id(&id)))
}

fn cmd_done(ctx: &Context, args: IdArgs) -> CmdResult {
    let mut app = ctx.open_app()?;
    let id = app.resolve(&args.id)?;
    let outcome = app.toggle_completion(&id, Utc::now())?;

    let mut text = if outcome.completed {
        format!("completed {}", short_id(&id))
    } else {
        format!("reopened {}", short_id(&id))
    };
    if let Some(next) = &outcome.spawned
        && let Some(task) = app.find(next)
        && let Some(due) = task.due_date
    {
        text.push_str(&format!("\nnext {} due {}", short_id(next), format_date(due)));
    }

    let result = MutationJson {
        id,
        completed: Some(outcome.completed),
        archived: None,
        spawned: outcome.spawned,
    };
    print_mutation(ctx, result, text)
}

fn cmd_archive(ctx: &Context, args: IdArgs) -> CmdResult {
    let mut app = ctx.open_app()?;
    let id = app.resolve(&args.id)?;
    let archived = app.toggle_archived(&id)?;
    let text = if archived {
        format!("archived {}", short_id(&id))
    } else {
        format!("unarchived {}", short_id(&id))
    };
    let result = MutationJson {
        id,
        completed: None,
        archived: Some(archived),
        spawned: None,
    };
    print_mutation(ctx, result, text)
}

fn cmd_import(ctx: &Context, args: ImportArgs) -> CmdResult {
    let json = fs::read_to_string(&args.file)
        .map_err(|e| format!("could not read {}: {}", args.file.display(), e))?;

    // an import replaces everything, so it may also recover an unreadable file
    let mut app = ctx.load_app();
    let count = app.import_bulk(&json)?;
    println!(
        "imported {} top-level tasks ({} including subtasks)",
        app.tasks().len(),
        count
    );
    Ok(())
}

fn cmd_clear_completed(ctx: &Context) -> CmdResult {
    let mut app = ctx.open_app()?;
    let removed = app.clear_completed();
    println!("removed {} completed tasks", removed);
    Ok(())
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

fn cmd_watch(ctx: &Context) -> CmdResult {
    let remote = ctx
        .remote_path()
        .ok_or("no remote configured: set storage.remote in config.toml")?;
    if let Some(dir) = remote.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut app = ctx.open_app()?;
    let watcher = RemoteWatcher::start(&remote)?;
    info!("event=watch remote={}", remote.display());
    println!("watching {} ({})", remote.display(), app.sync_status());

    loop {
        let Some(first) = watcher.wait(Duration::from_secs(1)) else {
            continue;
        };
        for event in std::iter::once(first).chain(watcher.poll()) {
            app.apply_sync_event(event);
        }
        let stats = app.statistics(Utc::now());
        println!(
            "{} {} tasks, {}% complete",
            app.sync_status(),
            stats.total,
            stats.completion_rate
        );
    }
}
