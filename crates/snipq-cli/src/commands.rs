use crate::cli::Commands;
use crate::utils::{format_history_line, format_params, format_snippet_line};
use snipq_core::{resolve_vault_path, CounterOpts, Engine, Group, Result, Snippet, TriggerInput};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SAMPLE_GROUP_ID: &str = "general";
pub const SAMPLE_SNIPPET_ID: &str = "hello";

fn open_engine(vault: &Path) -> Result<Engine> {
    let mut engine = Engine::new();
    engine.open_vault(vault)?;
    debug!("Opened vault at {}", vault.display());
    Ok(engine)
}

/// Run one subcommand against the vault and return what should be printed.
pub fn handle_command(vault: Option<PathBuf>, command: Commands) -> Result<String> {
    let vault = resolve_vault_path(vault);

    match command {
        Commands::Expand { trigger, app, json } => handle_expand(&vault, &trigger, app, json),
        Commands::Preview { trigger } => {
            let engine = open_engine(&vault)?;
            let output = engine.preview(&TriggerInput::new(trigger))?;
            Ok(format!("{}\n", output))
        }
        Commands::List { group } => handle_list(&vault, group.as_deref()),
        Commands::Search { query } => {
            let engine = open_engine(&vault)?;
            let matches = engine.search_snippets(&query);
            if matches.is_empty() {
                return Ok(format!("No snippets match '{}'\n", query));
            }
            Ok(matches.into_iter().map(format_snippet_line).collect())
        }
        Commands::Counter { name, pad, step } => {
            let mut engine = open_engine(&vault)?;
            let value = engine.next_counter(&name, &CounterOpts { pad, step })?;
            Ok(format!("{}\n", value))
        }
        Commands::Backup { dir } => {
            let engine = open_engine(&vault)?;
            let path = engine.backup(dir)?;
            Ok(format!("Backup written to {}\n", path.display()))
        }
        Commands::Restore { path } => {
            let mut engine = open_engine(&vault)?;
            engine.restore(&path)?;
            Ok(format!("Vault restored from {}\n", path.display()))
        }
        Commands::History { limit, clear } => handle_history(&vault, limit, clear),
        Commands::Settings => {
            let engine = open_engine(&vault)?;
            Ok(serde_yaml::to_string(engine.settings())?)
        }
        Commands::Init => handle_init(&vault),
    }
}

fn handle_expand(vault: &Path, trigger: &str, app: Option<String>, json: bool) -> Result<String> {
    let mut engine = open_engine(vault)?;
    let mut input = TriggerInput::new(trigger);
    if let Some(app) = app {
        input = input.with_app(app);
    }

    let rendered = engine.expand(&input)?;
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(&rendered)?));
    }

    debug!(
        "Expanded {} with snippet {}:\n{}",
        trigger,
        rendered.used_snippet,
        format_params(&rendered.used_params)
    );
    Ok(format!("{}\n", rendered.output))
}

fn handle_list(vault: &Path, only: Option<&str>) -> Result<String> {
    let engine = open_engine(vault)?;
    let mut out = String::new();

    for group in engine.list_groups() {
        if only.map_or(false, |id| id != group.id) {
            continue;
        }
        let state = if group.enabled { "" } else { " [disabled]" };
        out.push_str(&format!("{} ({}){}\n", group.name, group.id, state));
        for snippet in engine.list_snippets(&group.id) {
            out.push_str(&format_snippet_line(snippet));
        }
        out.push('\n');
    }

    if out.is_empty() {
        out.push_str("No snippets yet. Run 'snipq init' to create a sample vault.\n");
    }
    Ok(out)
}

fn handle_history(vault: &Path, limit: usize, clear: bool) -> Result<String> {
    let mut engine = open_engine(vault)?;
    if clear {
        engine.clear_history()?;
        return Ok("History cleared\n".to_string());
    }

    let history = engine.history();
    let start = history.len().saturating_sub(limit);
    // newest first
    Ok(history[start..]
        .iter()
        .rev()
        .map(format_history_line)
        .collect())
}

fn handle_init(vault: &Path) -> Result<String> {
    let mut engine = open_engine(vault)?;

    if engine.vault().get_group(SAMPLE_GROUP_ID).is_none() {
        engine.create_group(Group::new(SAMPLE_GROUP_ID, "General"))?;
    }
    if engine.get_snippet(SAMPLE_SNIPPET_ID).is_none() {
        let mut snippet = Snippet::new(
            SAMPLE_SNIPPET_ID,
            ":hello",
            "Hello, World! Generated at {{ date \"15:04:05\" \"Local\" }}",
            SAMPLE_GROUP_ID,
        );
        snippet.name = "Hello World".to_string();
        snippet.description = Some("Simple hello world snippet".to_string());
        engine.upsert_snippet(snippet)?;
    }
    engine.save()?;

    info!("Initialized vault at {}", vault.display());
    Ok(format!(
        "Vault initialized at {}\n\nTry:\n  snipq --vault {} expand ':hello'\n",
        vault.display(),
        vault.display()
    ))
}
