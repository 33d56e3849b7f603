use super::files;
use super::validation::{validate_group, validate_snippet, validate_vault_path};
use super::Vault;
use crate::config::{
    BACKUP_PREFIX, BACKUP_TIMESTAMP_FORMAT, BACKUP_VERSION, COUNTERS_FILENAME, GROUPS_SNAPSHOT,
    MANIFEST_FILENAME, PRE_RESTORE_DIR, SETTINGS_FILENAME, SNIPPETS_SNAPSHOT,
};
use crate::error::{EntityKind, Result, SnipqError};
use crate::models::{BackupManifest, Counter, Group, Settings, Snippet};
use chrono::Local;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything a backup carries, parsed up front so a bad snapshot is
/// rejected before the vault is touched.
struct Snapshot {
    snippets: BTreeMap<String, Snippet>,
    groups: BTreeMap<String, Group>,
    settings: Settings,
    counters: BTreeMap<String, Counter>,
}

impl Snapshot {
    fn read(dir: &Path) -> Result<Self> {
        let snapshot = Self {
            snippets: serde_json::from_str(&files::read(&dir.join(SNIPPETS_SNAPSHOT))?)?,
            groups: serde_json::from_str(&files::read(&dir.join(GROUPS_SNAPSHOT))?)?,
            settings: serde_yaml::from_str(&files::read(&dir.join(SETTINGS_FILENAME))?)?,
            counters: serde_json::from_str(&files::read(&dir.join(COUNTERS_FILENAME))?)?,
        };

        // ids become paths on restore
        for snippet in snapshot.snippets.values() {
            validate_snippet(snippet)?;
        }
        for group in snapshot.groups.values() {
            validate_group(group)?;
        }
        Ok(snapshot)
    }
}

/// Pick a backup directory name that does not exist yet.
fn unique_backup_path(dir: &Path) -> PathBuf {
    let base = format!("{}{}", BACKUP_PREFIX, Local::now().format(BACKUP_TIMESTAMP_FORMAT));
    let mut candidate = dir.join(&base);
    let mut suffix = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}", base, suffix));
        suffix += 1;
    }
    candidate
}

impl Vault {
    /// Write a snapshot of the vault into a new directory under `dir` and
    /// return its path.
    pub fn backup_vault(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let source = self.root()?.to_path_buf();
        let dir = validate_vault_path(dir.as_ref())?;
        files::create_dir_all(&dir)?;

        let backup_path = unique_backup_path(&dir);
        files::create_dir_all(&backup_path)?;

        files::write_private(
            &backup_path.join(SNIPPETS_SNAPSHOT),
            &serde_json::to_string_pretty(&self.snippets)?,
        )?;
        files::write_private(
            &backup_path.join(GROUPS_SNAPSHOT),
            &serde_json::to_string_pretty(&self.groups)?,
        )?;
        files::write_private(
            &backup_path.join(SETTINGS_FILENAME),
            &serde_yaml::to_string(&self.settings)?,
        )?;
        files::write_private(
            &backup_path.join(COUNTERS_FILENAME),
            &serde_json::to_string_pretty(&self.counters)?,
        )?;

        let manifest = BackupManifest {
            created_at: Local::now(),
            source_path: source,
            backup_path: backup_path.clone(),
            version: BACKUP_VERSION.to_string(),
        };
        files::write_private(
            &backup_path.join(MANIFEST_FILENAME),
            &serde_json::to_string_pretty(&manifest)?,
        )?;

        info!("Created backup at {}", backup_path.display());
        Ok(backup_path)
    }

    /// Replace the vault contents with a backup and reload.
    ///
    /// The current state is first backed up under `backups/pre_restore`.
    pub fn restore_vault(&mut self, backup_path: impl AsRef<Path>) -> Result<()> {
        let root = self.root()?.to_path_buf();
        let backup_path = validate_vault_path(backup_path.as_ref())?;

        let manifest_path = backup_path.join(MANIFEST_FILENAME);
        let manifest: BackupManifest = match files::read_optional(&manifest_path)? {
            Some(content) => serde_json::from_str(&content)?,
            None => {
                return Err(SnipqError::not_found(
                    EntityKind::Backup,
                    manifest_path.display().to_string(),
                ))
            }
        };
        let snapshot = Snapshot::read(&backup_path)?;

        let pre_restore = self.backup_vault(root.join(PRE_RESTORE_DIR))?;
        info!(
            "Restoring backup from {} (created {}), previous state saved to {}",
            backup_path.display(),
            manifest.created_at.to_rfc3339(),
            pre_restore.display()
        );

        files::remove_dir_all(&self.groups_dir()?)?;
        files::create_dir_all(&self.groups_dir()?)?;

        for group in snapshot.groups.values() {
            self.write_group(group)?;
        }
        for snippet in snapshot.snippets.values() {
            self.write_snippet(snippet)?;
        }

        self.settings = snapshot.settings;
        self.save_settings_file()?;
        self.counters = snapshot.counters;
        self.save_counters()?;

        self.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_layout_and_manifest() {
        let vault_dir = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let mut vault = Vault::new();
        vault.load(vault_dir.path()).unwrap();

        let path = vault.backup_vault(backups.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(BACKUP_PREFIX));

        for file in [
            SNIPPETS_SNAPSHOT,
            GROUPS_SNAPSHOT,
            SETTINGS_FILENAME,
            COUNTERS_FILENAME,
            MANIFEST_FILENAME,
        ] {
            assert!(path.join(file).exists(), "{}", file);
        }

        let manifest: BackupManifest =
            serde_json::from_str(&std::fs::read_to_string(path.join(MANIFEST_FILENAME)).unwrap())
                .unwrap();
        assert_eq!(manifest.version, "1.0");
        assert_eq!(manifest.backup_path, path);
    }

    #[test]
    fn test_backup_name_collision_gets_suffix() {
        let vault_dir = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let mut vault = Vault::new();
        vault.load(vault_dir.path()).unwrap();

        let first = vault.backup_vault(backups.path()).unwrap();
        let second = vault.backup_vault(backups.path()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_restore_without_manifest() {
        let vault_dir = TempDir::new().unwrap();
        let empty = TempDir::new().unwrap();
        let mut vault = Vault::new();
        vault.load(vault_dir.path()).unwrap();

        let err = vault.restore_vault(empty.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_restore_rejects_corrupt_snapshot_untouched() {
        let vault_dir = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();
        let mut vault = Vault::new();
        vault.load(vault_dir.path()).unwrap();
        vault.create_group(Group::new("general", "General")).unwrap();

        let path = vault.backup_vault(backups.path()).unwrap();
        std::fs::write(path.join(SNIPPETS_SNAPSHOT), "{ not json").unwrap();

        vault.create_group(Group::new("later", "Later")).unwrap();
        assert!(vault.restore_vault(&path).is_err());
        assert!(vault.get_group("later").is_some());
        assert!(!vault_dir.path().join(PRE_RESTORE_DIR).exists());
    }
}
