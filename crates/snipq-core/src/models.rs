use crate::config::{DEFAULT_HISTORY_LIMIT, MAX_COUNTER_PAD, SPECIAL_CHAR};
use crate::value::{Params, Value};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A named collection of snippets, stored as `groups/<id>/group.yaml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Group {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Group {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            icon: None,
            order: 0,
            enabled: true,
        }
    }
}

/// A parameterized text template bound to a trigger.
///
/// `group_id` is not part of the snippet file on disk; the vault fills it in
/// from the directory the file was loaded from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: Params,
    pub template: String,
    #[serde(default)]
    pub group_id: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Snippet {
    pub fn new(
        id: impl Into<String>,
        trigger: impl Into<String>,
        template: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            trigger: trigger.into(),
            description: None,
            tags: Vec::new(),
            strict: false,
            defaults: Params::new(),
            template: template.into(),
            group_id: group_id.into(),
        }
    }
}

/// Vault-wide settings, stored as `settings.yaml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub prefix: String,
    pub expand_key: String,
    pub strict_boundaries: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub excluded_apps: Vec<String>,
    pub locale: String,
    pub default_date_format: String,
    pub timezone: String,
    pub history_enabled: bool,
    pub history_limit: i64,
    pub pin_for_sensitive: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: SPECIAL_CHAR.to_string(),
            expand_key: "Tab".to_string(),
            strict_boundaries: true,
            excluded_apps: Vec::new(),
            locale: "en-US".to_string(),
            default_date_format: "2006-01-02".to_string(),
            timezone: "Local".to_string(),
            history_enabled: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
            pin_for_sensitive: true,
        }
    }
}

impl Settings {
    pub fn is_app_excluded(&self, app_id: &str) -> bool {
        self.excluded_apps.iter().any(|excluded| excluded == app_id)
    }

    /// Lowest-priority parameters every template sees.
    pub fn global_defaults(&self) -> Params {
        let mut defaults = Params::new();
        defaults.insert(
            "dateFormat".to_string(),
            Value::from(self.default_date_format.as_str()),
        );
        defaults.insert("timezone".to_string(), Value::from(self.timezone.as_str()));
        defaults.insert("locale".to_string(), Value::from(self.locale.as_str()));
        defaults
    }
}

/// Persistent counter state, stored in `counters.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub value: i64,
    pub step: i64,
    pub start: i64,
    pub updated_at: DateTime<Local>,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            value: 1,
            step: 1,
            start: 1,
            updated_at: Local::now(),
        }
    }
}

impl Counter {
    /// Value after one increment, using `step_override` when positive.
    pub fn next_value(&self, step_override: Option<i64>) -> i64 {
        let step = step_override.filter(|s| *s > 0).unwrap_or(self.step);
        self.value + step
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CounterOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
}

/// Zero-pad a counter value to `pad` digits, at most [`MAX_COUNTER_PAD`].
pub fn format_counter(value: i64, pad: usize) -> String {
    format!("{:0width$}", value, width = pad.min(MAX_COUNTER_PAD))
}

/// One line of `history.jsonl`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub snippet_id: String,
    pub output: String,
    #[serde(default)]
    pub used_params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl HistoryEntry {
    pub fn formatted_time(&self) -> String {
        let duration = Local::now().signed_duration_since(self.timestamp);

        if duration.num_seconds() < 60 {
            format!("{}s ago", duration.num_seconds().max(0))
        } else if duration.num_minutes() < 60 {
            format!("{}m ago", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h ago", duration.num_hours())
        } else {
            format!("{}d ago", duration.num_days())
        }
    }
}

/// A raw expansion request from a front-end.
#[derive(Debug, Clone, Default)]
pub struct TriggerInput {
    pub raw_trigger: String,
    pub app_id: Option<String>,
    pub now: Option<DateTime<Local>>,
}

impl TriggerInput {
    pub fn new(raw_trigger: impl Into<String>) -> Self {
        Self {
            raw_trigger: raw_trigger.into(),
            ..Self::default()
        }
    }

    pub fn with_app(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Result of a successful expansion.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rendered {
    pub output: String,
    pub cursor_offset: usize,
    pub used_snippet: String,
    pub used_params: Params,
}

/// Contents of `manifest.json` inside a backup directory. Keys stay
/// snake_case on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackupManifest {
    pub created_at: DateTime<Local>,
    pub source_path: PathBuf,
    pub backup_path: PathBuf,
    pub version: String,
}
