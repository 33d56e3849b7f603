use crate::error::{EntityKind, Result, SnipqError};
use crate::models::{
    format_counter, Counter, CounterOpts, Group, HistoryEntry, Rendered, Settings, Snippet,
    TriggerInput,
};
use crate::parser::{merge_params, parse_trigger};
use crate::template::{RenderContext, Template};
use crate::value::{Params, Value};
use crate::vault::Vault;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Parameter keys injected into every render, overriding user values.
pub const NOW_PARAM: &str = "now";
pub const TIMESTAMP_PARAM: &str = "timestamp";

/// A resolved request, rendered but not yet committed.
struct Expansion {
    snippet_id: String,
    output: String,
    params: Params,
    counters: Vec<(String, Counter)>,
    now: DateTime<Local>,
}

/// Owns a [`Vault`] and runs expansions against it.
#[derive(Debug, Default)]
pub struct Engine {
    vault: Vault,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vault(vault: Vault) -> Self {
        Self { vault }
    }

    pub fn open_vault(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.vault.load(path)
    }

    pub fn reload(&mut self) -> Result<()> {
        self.vault.reload()
    }

    pub fn save(&self) -> Result<()> {
        self.vault.save()
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Expand a trigger, advancing any counters it uses and recording it in
    /// history.
    pub fn expand(&mut self, input: &TriggerInput) -> Result<Rendered> {
        let expansion = self.render_request(input, true)?;

        for (name, counter) in &expansion.counters {
            self.vault.update_counter(name, counter.clone())?;
        }

        let entry = HistoryEntry {
            timestamp: expansion.now,
            snippet_id: expansion.snippet_id.clone(),
            output: expansion.output.clone(),
            used_params: expansion.params.clone(),
            app_id: input.app_id.clone(),
        };
        if let Err(e) = self.vault.add_history_entry(entry) {
            warn!("Failed to record history for {}: {}", expansion.snippet_id, e);
        }

        Ok(Rendered {
            output: expansion.output,
            cursor_offset: 0,
            used_snippet: expansion.snippet_id,
            used_params: expansion.params,
        })
    }

    /// Render a trigger without touching counters or history. App exclusion
    /// is not applied.
    pub fn preview(&self, input: &TriggerInput) -> Result<String> {
        Ok(self.render_request(input, false)?.output)
    }

    fn render_request(&self, input: &TriggerInput, check_exclusion: bool) -> Result<Expansion> {
        let now = input.now.unwrap_or_else(Local::now);
        let parsed = parse_trigger(&input.raw_trigger)?;

        let snippet = self
            .vault
            .find_snippet_by_trigger(&parsed.trigger)
            .ok_or_else(|| SnipqError::not_found(EntityKind::Snippet, &parsed.trigger))?;
        debug!("Trigger {} resolved to snippet {}", parsed.trigger, snippet.id);

        let settings = self.vault.settings();
        if check_exclusion {
            if let Some(app_id) = input.app_id.as_deref() {
                if settings.is_app_excluded(app_id) {
                    return Err(SnipqError::Excluded(app_id.to_string()));
                }
            }
        }

        let mut params = merge_params(&parsed.params, &snippet.defaults, &settings.global_defaults());
        params.insert(NOW_PARAM.to_string(), Value::from(now));
        params.insert(TIMESTAMP_PARAM.to_string(), Value::Int(now.timestamp()));

        let template = Template::parse(&snippet.template)?;

        // each counter advances at most once per request
        let mut ctx = RenderContext::at(now);
        let mut counters = Vec::new();
        for name in template.counter_names(&params) {
            let current = self.vault.get_counter(&name).cloned().unwrap_or_default();
            let next = Counter {
                value: current.next_value(None),
                updated_at: now,
                ..current
            };
            ctx.counters.insert(name.clone(), next.value);
            counters.push((name, next));
        }

        let output = template.render(&params, &ctx)?;

        // counters in branches that did not run stay where they were
        let read = ctx.read_counters();
        counters.retain(|(name, _)| read.contains(name));

        Ok(Expansion {
            snippet_id: snippet.id.clone(),
            output,
            params,
            counters,
            now,
        })
    }

    /// Advance a named counter and return its new value, zero-padded to
    /// `opts.pad` digits.
    pub fn next_counter(&mut self, name: &str, opts: &CounterOpts) -> Result<String> {
        let current = self.vault.get_counter(name).cloned().unwrap_or_default();
        let counter = Counter {
            value: current.next_value(opts.step),
            updated_at: Local::now(),
            ..current
        };
        let value = counter.value;
        self.vault.update_counter(name, counter)?;
        debug!("Counter {} advanced to {}", name, value);
        Ok(format_counter(value, opts.pad.unwrap_or(0)))
    }

    // Groups

    pub fn list_groups(&self) -> Vec<&Group> {
        self.vault.list_groups()
    }

    pub fn create_group(&mut self, group: Group) -> Result<()> {
        self.vault.create_group(group)
    }

    pub fn upsert_group(&mut self, group: Group) -> Result<()> {
        self.vault.upsert_group(group)
    }

    pub fn delete_group(&mut self, id: &str) -> Result<()> {
        self.vault.delete_group(id)
    }

    // Snippets

    pub fn get_snippet(&self, id: &str) -> Option<&Snippet> {
        self.vault.get_snippet(id)
    }

    pub fn upsert_snippet(&mut self, snippet: Snippet) -> Result<()> {
        self.vault.upsert_snippet(snippet)
    }

    pub fn delete_snippet(&mut self, id: &str) -> Result<()> {
        self.vault.delete_snippet(id)
    }

    pub fn list_snippets(&self, group_id: &str) -> Vec<&Snippet> {
        self.vault.list_snippets(group_id)
    }

    pub fn list_all_snippets(&self) -> Vec<&Snippet> {
        self.vault.list_all_snippets()
    }

    pub fn search_snippets(&self, query: &str) -> Vec<&Snippet> {
        self.vault.search_snippets(query)
    }

    // Settings, history, backups

    pub fn settings(&self) -> &Settings {
        self.vault.settings()
    }

    pub fn save_settings(&mut self, settings: Settings) -> Result<()> {
        self.vault.save_settings(settings)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.vault.history()
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.vault.clear_history()
    }

    pub fn backup(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.vault.backup_vault(dir)
    }

    pub fn restore(&mut self, backup_path: impl AsRef<Path>) -> Result<()> {
        self.vault.restore_vault(backup_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn engine_with(snippets: &[Snippet]) -> (TempDir, Engine) {
        let dir = TempDir::new().unwrap();
        let mut engine = Engine::new();
        engine.open_vault(dir.path()).unwrap();
        engine.create_group(Group::new("general", "General")).unwrap();
        for snippet in snippets {
            engine.upsert_snippet(snippet.clone()).unwrap();
        }
        (dir, engine)
    }

    fn hello() -> Snippet {
        Snippet::new("hello", ":hello", "Hello, World!", "general")
    }

    #[test]
    fn test_expand_hello() {
        let (_dir, mut engine) = engine_with(&[hello()]);
        let rendered = engine.expand(&TriggerInput::new(":hello")).unwrap();

        assert_eq!(rendered.output, "Hello, World!");
        assert_eq!(rendered.used_snippet, "hello");
        assert_eq!(rendered.cursor_offset, 0);
        assert_eq!(engine.history().len(), 1);
        assert_eq!(engine.history()[0].snippet_id, "hello");
    }

    #[test]
    fn test_expand_missing_records_nothing() {
        let (_dir, mut engine) = engine_with(&[hello()]);
        let err = engine.expand(&TriggerInput::new(":missing")).unwrap_err();
        assert!(err.is_not_found());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_parameter_priority_and_injected_keys() {
        let mut snippet = Snippet::new(
            "ty",
            ":ty",
            r#"{{ if eq .lang "vi" }}Cảm ơn{{ else }}Thanks{{ end }} ({{ .tone }}, {{ .locale }})"#,
            "general",
        );
        snippet.defaults.insert("lang".into(), Value::from("en"));
        snippet.defaults.insert("tone".into(), Value::from("formal"));
        snippet.defaults.insert("now".into(), Value::from("user value"));
        let (_dir, mut engine) = engine_with(&[snippet]);

        let now = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let rendered = engine
            .expand(&TriggerInput::new(":ty?lang=vi").at(now))
            .unwrap();
        assert_eq!(rendered.output, "Cảm ơn (formal, en-US)");
        assert_eq!(rendered.used_params["now"], Value::from(now));
        assert_eq!(rendered.used_params["timestamp"], Value::Int(now.timestamp()));
    }

    #[test]
    fn test_excluded_app() {
        let (_dir, mut engine) = engine_with(&[hello()]);
        let mut settings = engine.settings().clone();
        settings.excluded_apps = vec!["com.bank.app".to_string()];
        engine.save_settings(settings).unwrap();

        let input = TriggerInput::new(":hello").with_app("com.bank.app");
        assert!(matches!(engine.expand(&input), Err(SnipqError::Excluded(_))));
        assert!(engine.history().is_empty());

        let other = TriggerInput::new(":hello").with_app("com.editor");
        assert!(engine.expand(&other).is_ok());
    }

    #[test]
    fn test_parse_error_surfaces() {
        let (_dir, mut engine) = engine_with(&[hello()]);
        let err = engine.expand(&TriggerInput::new(":hello?x=%zz")).unwrap_err();
        assert!(matches!(err, SnipqError::Parse { .. }));
    }

    #[test]
    fn test_render_error_surfaces_without_side_effects() {
        let broken = Snippet::new("bad", ":bad", "{{ counter \"inv\" 3 }}{{ nosuch }}", "general");
        let (_dir, mut engine) = engine_with(&[broken]);

        let err = engine.expand(&TriggerInput::new(":bad")).unwrap_err();
        assert!(matches!(err, SnipqError::TemplateExec(_)));
        assert!(engine.vault().get_counter("inv").is_none());
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_counter_advances_once_per_expansion() {
        let snippet = Snippet::new(
            "inv",
            ":inv",
            r#"INV-{{ counter "invoice" 4 }} / {{ counter "invoice" 4 }}"#,
            "general",
        );
        let (_dir, mut engine) = engine_with(&[snippet]);

        let first = engine.expand(&TriggerInput::new(":inv")).unwrap();
        assert_eq!(first.output, "INV-0002 / 0002");
        let second = engine.expand(&TriggerInput::new(":inv")).unwrap();
        assert_eq!(second.output, "INV-0003 / 0003");
        assert_eq!(engine.vault().get_counter("invoice").unwrap().value, 3);
    }

    #[test]
    fn test_preview_has_no_side_effects() {
        let snippet = Snippet::new("inv", ":inv", r#"#{{ counter "invoice" 0 }}"#, "general");
        let (_dir, mut engine) = engine_with(&[snippet]);

        assert_eq!(engine.preview(&TriggerInput::new(":inv")).unwrap(), "#2");
        assert_eq!(engine.preview(&TriggerInput::new(":inv")).unwrap(), "#2");
        assert!(engine.vault().get_counter("invoice").is_none());
        assert!(engine.history().is_empty());

        assert_eq!(engine.expand(&TriggerInput::new(":inv")).unwrap().output, "#2");
        assert_eq!(engine.preview(&TriggerInput::new(":inv")).unwrap(), "#3");
    }

    #[test]
    fn test_preview_ignores_exclusion() {
        let (_dir, mut engine) = engine_with(&[hello()]);
        let mut settings = engine.settings().clone();
        settings.excluded_apps = vec!["term".to_string()];
        engine.save_settings(settings).unwrap();

        let input = TriggerInput::new(":hello").with_app("term");
        assert_eq!(engine.preview(&input).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_next_counter() {
        let (_dir, mut engine) = engine_with(&[]);
        assert_eq!(engine.next_counter("ticket", &CounterOpts::default()).unwrap(), "2");
        assert_eq!(
            engine
                .next_counter("ticket", &CounterOpts { pad: Some(5), step: Some(10) })
                .unwrap(),
            "00012"
        );
        // step override is not stored
        assert_eq!(engine.vault().get_counter("ticket").unwrap().step, 1);
        assert_eq!(engine.next_counter("ticket", &CounterOpts::default()).unwrap(), "13");
    }

    #[test]
    fn test_history_failure_is_swallowed() {
        let (dir, mut engine) = engine_with(&[hello()]);
        // a directory where the history file should go makes the write fail
        std::fs::create_dir(dir.path().join(crate::config::HISTORY_FILENAME)).unwrap();

        let rendered = engine.expand(&TriggerInput::new(":hello")).unwrap();
        assert_eq!(rendered.output, "Hello, World!");
    }

    #[test]
    fn test_counter_in_untaken_branch_is_not_advanced() {
        let snippet = Snippet::new(
            "inv",
            ":inv",
            r#"{{ if .numbered }}#{{ counter "invoice" 0 }} {{ end }}done"#,
            "general",
        );
        let (_dir, mut engine) = engine_with(&[snippet]);

        let plain = engine.expand(&TriggerInput::new(":inv")).unwrap();
        assert_eq!(plain.output, "done");
        assert!(engine.vault().get_counter("invoice").is_none());

        let numbered = engine.expand(&TriggerInput::new(":inv?numbered=1")).unwrap();
        assert_eq!(numbered.output, "#2 done");
        assert_eq!(engine.vault().get_counter("invoice").unwrap().value, 2);
    }
}
