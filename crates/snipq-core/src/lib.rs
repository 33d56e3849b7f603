pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod parser;
pub mod template;
pub mod value;
pub mod vault;

// Re-export common items for convenience
pub use config::{get_config_dir, resolve_vault_path, SPECIAL_CHAR, VAULT_ENV_VAR};
pub use engine::Engine;
pub use error::{EntityKind, Result, SnipqError, ValidationError};
pub use models::{
    BackupManifest, Counter, CounterOpts, Group, HistoryEntry, Rendered, Settings, Snippet,
    TriggerInput,
};
pub use parser::{merge_params, parse_trigger, validate_trigger, ParsedTrigger};
pub use template::{render, Template};
pub use value::{Params, Value};
pub use vault::Vault;
