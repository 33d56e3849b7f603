mod backup;
mod files;
pub mod validation;

use crate::config::{
    COUNTERS_FILENAME, GROUPS_DIR, GROUP_FILENAME, HISTORY_FILENAME, MAX_HISTORY_LIMIT,
    SETTINGS_FILENAME, SNIPPETS_DIR, SNIPPET_EXTENSION,
};
use crate::error::{EntityKind, Result, SnipqError, ValidationError};
use crate::models::{Counter, Group, HistoryEntry, Settings, Snippet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use validation::{validate_group, validate_settings, validate_snippet, validate_vault_path};

/// File-backed store rooted at a vault directory. Group and snippet changes
/// are written through immediately.
#[derive(Debug, Default)]
pub struct Vault {
    path: Option<PathBuf>,
    groups: BTreeMap<String, Group>,
    snippets: BTreeMap<String, Snippet>,
    settings: Settings,
    counters: BTreeMap<String, Counter>,
    history: Vec<HistoryEntry>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (creating if needed) the vault at `path`, replacing any state
    /// held from a previous load.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let root = validate_vault_path(path.as_ref())?;
        files::create_dir_all(&root)?;

        *self = Self {
            path: Some(root),
            ..Self::default()
        };

        self.load_settings()?;
        self.load_counters()?;
        self.load_history()?;
        self.load_groups()?;

        info!(
            "Loaded vault at {} ({} groups, {} snippets)",
            self.root()?.display(),
            self.groups.len(),
            self.snippets.len()
        );
        Ok(())
    }

    /// Re-read everything from the path of the last successful load.
    pub fn reload(&mut self) -> Result<()> {
        let root = self.root()?.to_path_buf();
        self.load(root)
    }

    /// Flush settings, counters and history.
    pub fn save(&self) -> Result<()> {
        self.save_settings_file()?;
        self.save_counters()?;
        self.save_history()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.path.is_some()
    }

    fn root(&self) -> Result<&Path> {
        self.path.as_deref().ok_or(SnipqError::NotLoaded)
    }

    fn groups_dir(&self) -> Result<PathBuf> {
        Ok(self.root()?.join(GROUPS_DIR))
    }

    fn group_dir(&self, group_id: &str) -> Result<PathBuf> {
        Ok(self.groups_dir()?.join(group_id))
    }

    fn snippet_file(&self, group_id: &str, snippet_id: &str) -> Result<PathBuf> {
        Ok(self
            .group_dir(group_id)?
            .join(SNIPPETS_DIR)
            .join(format!("{}.{}", snippet_id, SNIPPET_EXTENSION)))
    }

    // Settings

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn save_settings(&mut self, settings: Settings) -> Result<()> {
        validate_settings(&settings)?;
        self.root()?;
        self.settings = settings;
        self.save_settings_file()?;
        info!("Saved settings");
        Ok(())
    }

    fn load_settings(&mut self) -> Result<()> {
        let path = self.root()?.join(SETTINGS_FILENAME);
        match files::read_optional(&path)? {
            Some(content) if !content.trim().is_empty() => {
                self.settings = serde_yaml::from_str(&content)?;
                debug!("Loaded settings from {}", path.display());
            }
            _ => debug!("No settings file, using defaults"),
        }
        Ok(())
    }

    fn save_settings_file(&self) -> Result<()> {
        let path = self.root()?.join(SETTINGS_FILENAME);
        files::write_private(&path, &serde_yaml::to_string(&self.settings)?)
    }

    // Groups

    /// Groups ordered by `order`, then `name`, then `id`.
    pub fn list_groups(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.values().collect();
        groups.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        groups
    }

    pub fn get_group(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Insert or replace a group.
    pub fn upsert_group(&mut self, group: Group) -> Result<()> {
        validate_group(&group)?;
        self.write_group(&group)?;
        info!("Saved group {}", group.id);
        self.groups.insert(group.id.clone(), group);
        Ok(())
    }

    /// Insert a group whose id is not yet taken.
    pub fn create_group(&mut self, group: Group) -> Result<()> {
        validate_group(&group)?;
        if self.groups.contains_key(&group.id) {
            return Err(SnipqError::DuplicateGroup(group.id));
        }
        self.upsert_group(group)
    }

    /// Delete a group together with its snippets and directory.
    pub fn delete_group(&mut self, id: &str) -> Result<()> {
        if !self.groups.contains_key(id) {
            return Err(SnipqError::not_found(EntityKind::Group, id));
        }

        files::remove_dir_all(&self.group_dir(id)?)?;
        self.groups.remove(id);

        let before = self.snippets.len();
        self.snippets.retain(|_, snippet| snippet.group_id != id);
        info!(
            "Deleted group {} and {} snippets",
            id,
            before - self.snippets.len()
        );
        Ok(())
    }

    fn write_group(&self, group: &Group) -> Result<()> {
        let dir = self.group_dir(&group.id)?;
        files::create_dir_all(&dir.join(SNIPPETS_DIR))?;
        files::write_private(&dir.join(GROUP_FILENAME), &serde_yaml::to_string(group)?)
    }

    fn load_groups(&mut self) -> Result<()> {
        let groups_dir = self.groups_dir()?;
        files::create_dir_all(&groups_dir)?;

        for dir in files::list_dirs(&groups_dir)? {
            let Some(group_id) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                warn!("Skipping group directory with non UTF-8 name: {}", dir.display());
                continue;
            };
            self.load_group(&group_id, &dir)?;
        }
        Ok(())
    }

    fn load_group(&mut self, group_id: &str, dir: &Path) -> Result<()> {
        let group_file = dir.join(GROUP_FILENAME);
        let group = match files::read_optional(&group_file)? {
            Some(content) => match serde_yaml::from_str::<Group>(&content) {
                Ok(mut group) => {
                    group.id = group_id.to_string();
                    if group.name.trim().is_empty() {
                        group.name = group_id.to_string();
                    }
                    group
                }
                Err(e) => {
                    warn!("Skipping group {}: {}", group_file.display(), e);
                    return Ok(());
                }
            },
            None => {
                debug!("Group {} has no {}, creating one", group_id, GROUP_FILENAME);
                let group = Group::new(group_id, group_id);
                self.write_group(&group)?;
                group
            }
        };

        self.groups.insert(group.id.clone(), group);
        self.load_snippets_for_group(group_id, dir)
    }

    // Snippets

    fn load_snippets_for_group(&mut self, group_id: &str, dir: &Path) -> Result<()> {
        let snippets_dir = dir.join(SNIPPETS_DIR);
        files::create_dir_all(&snippets_dir)?;

        for file in files::list_files_with_extension(&snippets_dir, SNIPPET_EXTENSION)? {
            let content = files::read(&file)?;
            let mut snippet: Snippet = match serde_yaml::from_str(&content) {
                Ok(snippet) => snippet,
                Err(e) => {
                    warn!("Skipping corrupt snippet {}: {}", file.display(), e);
                    continue;
                }
            };

            // the file name is the id; delete and move address the file by it
            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping snippet with non UTF-8 file name: {}", file.display());
                continue;
            };
            if !snippet.id.trim().is_empty() && snippet.id != stem {
                warn!(
                    "Snippet {} declares id {:?}, using file name {:?}",
                    file.display(),
                    snippet.id,
                    stem
                );
            }
            snippet.id = stem.to_string();
            snippet.group_id = group_id.to_string();

            debug!("Loaded snippet {} ({})", snippet.id, snippet.trigger);
            self.snippets.insert(snippet.id.clone(), snippet);
        }
        Ok(())
    }

    fn write_snippet(&self, snippet: &Snippet) -> Result<()> {
        let path = self.snippet_file(&snippet.group_id, &snippet.id)?;
        if let Some(parent) = path.parent() {
            files::create_dir_all(parent)?;
        }
        files::write_private(&path, &snippet_to_yaml(snippet)?)
    }

    pub fn get_snippet(&self, id: &str) -> Option<&Snippet> {
        self.snippets.get(id)
    }

    /// Snippets of one group, ordered by name.
    pub fn list_snippets(&self, group_id: &str) -> Vec<&Snippet> {
        let mut snippets: Vec<&Snippet> = self
            .snippets
            .values()
            .filter(|s| s.group_id == group_id)
            .collect();
        snippets.sort_by(|a, b| a.name.cmp(&b.name));
        snippets
    }

    /// Every snippet, ordered by group id then name.
    pub fn list_all_snippets(&self) -> Vec<&Snippet> {
        let mut snippets: Vec<&Snippet> = self.snippets.values().collect();
        snippets.sort_by(|a, b| {
            a.group_id
                .cmp(&b.group_id)
                .then_with(|| a.name.cmp(&b.name))
        });
        snippets
    }

    /// Case-insensitive substring search over name, trigger and tags.
    pub fn search_snippets(&self, query: &str) -> Vec<&Snippet> {
        let needle = query.to_lowercase();
        let mut matches: Vec<&Snippet> = self
            .snippets
            .values()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s.trigger.to_lowercase().contains(&needle)
                    || s.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches
    }

    /// Resolve a trigger to a snippet.
    ///
    /// Groups are tried in [`list_groups`](Self::list_groups) order and
    /// snippets within a group by id, so the same trigger in two groups
    /// always resolves the same way. Disabled groups are skipped.
    pub fn find_snippet_by_trigger(&self, trigger: &str) -> Option<&Snippet> {
        self.list_groups()
            .into_iter()
            .filter(|group| group.enabled)
            .find_map(|group| {
                self.snippets
                    .values()
                    .find(|s| s.group_id == group.id && s.trigger == trigger)
            })
    }

    /// Insert or replace a snippet, keyed by id.
    pub fn upsert_snippet(&mut self, snippet: Snippet) -> Result<()> {
        validate_snippet(&snippet)?;

        if let Some(existing) = self.snippets.values().find(|s| {
            s.id != snippet.id && s.group_id == snippet.group_id && s.trigger == snippet.trigger
        }) {
            return Err(SnipqError::DuplicateTrigger {
                trigger: snippet.trigger,
                group_id: snippet.group_id,
                existing: existing.id.clone(),
            });
        }

        if !self.groups.contains_key(&snippet.group_id) {
            return Err(ValidationError::InvalidGroup {
                field: "id",
                reason: format!("group '{}' does not exist", snippet.group_id),
            }
            .into());
        }

        if let Some(other) = self.snippets.values().find(|s| {
            s.id != snippet.id && s.group_id != snippet.group_id && s.trigger == snippet.trigger
        }) {
            warn!(
                "Trigger {} is also used by snippet {} in group {}",
                snippet.trigger, other.id, other.group_id
            );
        }

        self.write_snippet(&snippet)?;

        // a snippet moved between groups leaves its old file behind otherwise
        if let Some(previous) = self.snippets.get(&snippet.id) {
            if previous.group_id != snippet.group_id {
                files::remove_file(&self.snippet_file(&previous.group_id, &previous.id)?)?;
            }
        }

        info!("Saved snippet {} ({})", snippet.id, snippet.trigger);
        self.snippets.insert(snippet.id.clone(), snippet);
        Ok(())
    }

    pub fn delete_snippet(&mut self, id: &str) -> Result<()> {
        let snippet = self
            .snippets
            .get(id)
            .ok_or_else(|| SnipqError::not_found(EntityKind::Snippet, id))?;

        files::remove_file(&self.snippet_file(&snippet.group_id, &snippet.id)?)?;
        self.snippets.remove(id);
        info!("Deleted snippet {}", id);
        Ok(())
    }

    // Counters

    pub fn get_counter(&self, name: &str) -> Option<&Counter> {
        self.counters.get(name)
    }

    pub fn counters(&self) -> &BTreeMap<String, Counter> {
        &self.counters
    }

    /// Persist `counter` under `name`. Memory is only updated once the file
    /// has been written.
    pub fn update_counter(&mut self, name: &str, counter: Counter) -> Result<()> {
        let mut counters = self.counters.clone();
        counters.insert(name.to_string(), counter);
        self.write_counters(&counters)?;
        self.counters = counters;
        Ok(())
    }

    fn load_counters(&mut self) -> Result<()> {
        let path = self.root()?.join(COUNTERS_FILENAME);
        if let Some(content) = files::read_optional(&path)? {
            if !content.trim().is_empty() {
                self.counters = serde_json::from_str(&content)?;
            }
        }
        Ok(())
    }

    fn save_counters(&self) -> Result<()> {
        self.write_counters(&self.counters)
    }

    fn write_counters(&self, counters: &BTreeMap<String, Counter>) -> Result<()> {
        let path = self.root()?.join(COUNTERS_FILENAME);
        files::write_private(&path, &serde_json::to_string_pretty(counters)?)
    }

    // History

    /// History entries, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Append an entry, dropping the oldest beyond `historyLimit`.
    pub fn add_history_entry(&mut self, entry: HistoryEntry) -> Result<()> {
        if !self.settings.history_enabled {
            return Ok(());
        }
        let limit = self.settings.history_limit.clamp(0, MAX_HISTORY_LIMIT) as usize;
        let mut history = self.history.clone();
        history.push(entry);
        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
        }

        self.write_history(&history)?;
        self.history = history;
        Ok(())
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.write_history(&[])?;
        self.history.clear();
        info!("Cleared history");
        Ok(())
    }

    fn load_history(&mut self) -> Result<()> {
        let path = self.root()?.join(HISTORY_FILENAME);
        let Some(content) = files::read_optional(&path)? else {
            return Ok(());
        };

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => self.history.push(entry),
                Err(e) => warn!("Skipping history line {}: {}", index + 1, e),
            }
        }
        Ok(())
    }

    fn save_history(&self) -> Result<()> {
        self.write_history(&self.history)
    }

    fn write_history(&self, history: &[HistoryEntry]) -> Result<()> {
        let path = self.root()?.join(HISTORY_FILENAME);
        let mut content = String::new();
        for entry in history {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }
        files::write_private(&path, &content)
    }
}

/// Serialize a snippet for its file; the group is implied by the directory.
fn snippet_to_yaml(snippet: &Snippet) -> Result<String> {
    let mut value = serde_yaml::to_value(snippet)?;
    if let serde_yaml::Value::Mapping(map) = &mut value {
        map.remove("groupId");
    }
    Ok(serde_yaml::to_string(&value)?)
}
