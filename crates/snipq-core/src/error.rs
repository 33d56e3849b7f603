use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Snippet,
    Group,
    Counter,
    Backup,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Snippet => "Snippet",
            EntityKind::Group => "Group",
            EntityKind::Counter => "Counter",
            EntityKind::Backup => "Backup",
        };
        f.write_str(name)
    }
}

/// Field-level validation failures for snippets, groups, settings and paths.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid snippet: {field} {reason}")]
    InvalidSnippet { field: &'static str, reason: String },

    #[error("Invalid group: {field} {reason}")]
    InvalidGroup { field: &'static str, reason: String },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid vault path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Error)]
pub enum SnipqError {
    #[error("Failed to parse trigger '{trigger}': {reason}")]
    Parse { trigger: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Duplicate trigger '{trigger}' in group '{group_id}' (snippet: {existing})")]
    DuplicateTrigger {
        trigger: String,
        group_id: String,
        existing: String,
    },

    #[error("Group with ID '{0}' already exists")]
    DuplicateGroup(String),

    #[error("App excluded: {0}")]
    Excluded(String),

    #[error("Template parse error: {0}")]
    TemplateParse(String),

    #[error("Template execution error: {0}")]
    TemplateExec(String),

    #[error("Vault not loaded")]
    NotLoaded,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnipqError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        SnipqError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SnipqError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SnipqError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, SnipqError>;
