use crate::config::{FORBIDDEN_ID_CHARS, MAX_HISTORY_LIMIT};
use crate::error::ValidationError;
use crate::models::{Group, Settings, Snippet};
use crate::parser::validate_trigger;
use std::env;
use std::path::{Path, PathBuf};

type Validation<T = ()> = std::result::Result<T, ValidationError>;

fn invalid_snippet(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidSnippet {
        field,
        reason: reason.to_string(),
    }
}

fn invalid_group(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidGroup {
        field,
        reason: reason.to_string(),
    }
}

/// Check a snippet before it is stored.
pub fn validate_snippet(snippet: &Snippet) -> Validation {
    let required = [
        ("id", &snippet.id),
        ("name", &snippet.name),
        ("trigger", &snippet.trigger),
        ("template", &snippet.template),
        ("groupId", &snippet.group_id),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(invalid_snippet(field, "cannot be empty"));
        }
    }

    if !validate_trigger(&snippet.trigger) {
        return Err(invalid_snippet("trigger", "cannot contain whitespace"));
    }

    // the id doubles as the snippet's file name
    if snippet.id.contains(FORBIDDEN_ID_CHARS) || snippet.id.starts_with('.') {
        return Err(invalid_snippet("id", "contains invalid characters"));
    }

    Ok(())
}

pub fn validate_group(group: &Group) -> Validation {
    if group.id.trim().is_empty() {
        return Err(invalid_group("id", "cannot be empty"));
    }
    if group.name.trim().is_empty() {
        return Err(invalid_group("name", "cannot be empty"));
    }
    if group.id.contains(FORBIDDEN_ID_CHARS) || group.id.starts_with('.') {
        return Err(invalid_group("id", "contains invalid characters"));
    }
    Ok(())
}

pub fn validate_settings(settings: &Settings) -> Validation {
    if settings.prefix.trim().is_empty() {
        return Err(ValidationError::InvalidSettings(
            "prefix cannot be empty".to_string(),
        ));
    }
    if settings.history_limit < 0 {
        return Err(ValidationError::InvalidSettings(
            "history limit cannot be negative".to_string(),
        ));
    }
    if settings.history_limit > MAX_HISTORY_LIMIT {
        return Err(ValidationError::InvalidSettings(format!(
            "history limit cannot exceed {}",
            MAX_HISTORY_LIMIT
        )));
    }
    Ok(())
}

/// Check a vault or backup path and make it absolute.
pub fn validate_vault_path(path: &Path) -> Validation<PathBuf> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(ValidationError::InvalidPath("path cannot be empty".to_string()));
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    let cwd = env::current_dir().map_err(|e| ValidationError::InvalidPath(e.to_string()))?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet() -> Snippet {
        Snippet::new("ty", ":ty", "Thank you!", "general")
    }

    #[test]
    fn test_valid_snippet() {
        assert!(validate_snippet(&snippet()).is_ok());
    }

    #[test]
    fn test_snippet_required_fields() {
        let mut s = snippet();
        s.template = "   ".to_string();
        assert_eq!(
            validate_snippet(&s),
            Err(ValidationError::InvalidSnippet {
                field: "template",
                reason: "cannot be empty".to_string()
            })
        );

        let mut s = snippet();
        s.group_id = String::new();
        assert!(matches!(
            validate_snippet(&s),
            Err(ValidationError::InvalidSnippet { field: "groupId", .. })
        ));
    }

    #[test]
    fn test_snippet_trigger_whitespace() {
        let mut s = snippet();
        s.trigger = ":t y".to_string();
        assert!(matches!(
            validate_snippet(&s),
            Err(ValidationError::InvalidSnippet { field: "trigger", .. })
        ));
    }

    #[test]
    fn test_snippet_id_must_be_file_safe() {
        for id in ["../evil", "a/b", "what?", ".hidden"] {
            let mut s = snippet();
            s.id = id.to_string();
            assert!(validate_snippet(&s).is_err(), "{}", id);
        }
    }

    #[test]
    fn test_group_id_characters() {
        assert!(validate_group(&Group::new("work", "Work")).is_ok());
        for id in ["my group", "a/b", "c:d", "e|f", "g\"h"] {
            assert!(validate_group(&Group::new(id, "Name")).is_err(), "{}", id);
        }
        assert!(validate_group(&Group::new("work", " ")).is_err());
    }

    #[test]
    fn test_settings_history_limit_bounds() {
        let mut settings = Settings::default();
        settings.history_limit = -1;
        assert!(validate_settings(&settings).is_err());
        settings.history_limit = 20_000;
        assert!(validate_settings(&settings).is_err());
        settings.history_limit = 100;
        assert!(validate_settings(&settings).is_ok());
        settings.history_limit = MAX_HISTORY_LIMIT;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_settings_prefix_required() {
        let settings = Settings {
            prefix: " ".to_string(),
            ..Settings::default()
        };
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_vault_path() {
        assert!(validate_vault_path(Path::new("")).is_err());
        assert!(validate_vault_path(Path::new("  ")).is_err());

        let resolved = validate_vault_path(Path::new("vault")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("vault"));
    }
}
