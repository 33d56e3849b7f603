use std::env;
use std::path::PathBuf;

pub const SPECIAL_CHAR: char = ':';
pub const VAULT_ENV_VAR: &str = "SNIPQ_VAULT";

pub const SETTINGS_FILENAME: &str = "settings.yaml";
pub const COUNTERS_FILENAME: &str = "counters.json";
pub const HISTORY_FILENAME: &str = "history.jsonl";
pub const GROUPS_DIR: &str = "groups";
pub const SNIPPETS_DIR: &str = "snippets";
pub const GROUP_FILENAME: &str = "group.yaml";
pub const SNIPPET_EXTENSION: &str = "yaml";

pub const DEFAULT_HISTORY_LIMIT: i64 = 200;
pub const MAX_HISTORY_LIMIT: i64 = 10_000;
pub const MAX_COUNTER_PAD: usize = 64;

pub const BACKUP_PREFIX: &str = "snipq_backup_";
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const BACKUP_VERSION: &str = "1.0";
pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const SNIPPETS_SNAPSHOT: &str = "snippets.json";
pub const GROUPS_SNAPSHOT: &str = "groups.json";
pub const PRE_RESTORE_DIR: &str = "backups/pre_restore";

/// Characters that would make an ID unsafe as a file or directory name.
pub const FORBIDDEN_ID_CHARS: &[char] = &[
    ' ', '\t', '\n', '\r', '/', '\\', ':', '*', '?', '"', '<', '>', '|',
];

/// Get the snipq configuration directory
pub fn get_config_dir() -> PathBuf {
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".snipq"))
        .unwrap_or_else(|_| PathBuf::from(".snipq"))
}

/// Get the default vault location inside the configuration directory
pub fn default_vault_dir() -> PathBuf {
    get_config_dir().join("vault")
}

/// Resolve the vault path from an explicit value, the environment, or the default
pub fn resolve_vault_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            env::var(VAULT_ENV_VAR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(default_vault_dir)
}
