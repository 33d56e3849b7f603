use snipq_core::{Counter, Group, Settings, Snippet, SnipqError, Value, Vault};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Vault {
    let mut vault = Vault::new();
    vault.load(dir.path()).expect("vault should load");
    vault
}

fn sample_snippet() -> Snippet {
    let mut snippet = Snippet::new(
        "ty",
        ":ty",
        r#"{{ if eq .lang "vi" }}Cảm ơn{{ else }}Thank you{{ end }}"#,
        "general",
    );
    snippet.name = "Thanks".to_string();
    snippet.description = Some("Polite thanks".to_string());
    snippet.tags = vec!["polite".to_string(), "reply".to_string()];
    snippet.strict = true;
    snippet.defaults.insert("lang".into(), Value::from("en"));
    snippet.defaults.insert("count".into(), Value::Int(3));
    snippet
}

#[test]
fn upsert_then_fresh_load_reproduces_snippet() {
    let dir = TempDir::new().unwrap();
    {
        let mut vault = open(&dir);
        let mut group = Group::new("general", "General");
        group.description = Some("Everyday snippets".to_string());
        group.icon = Some("star".to_string());
        group.order = 2;
        vault.create_group(group).unwrap();
        vault.upsert_snippet(sample_snippet()).unwrap();
    }

    let vault = open(&dir);
    assert_eq!(vault.get_snippet("ty"), Some(&sample_snippet()));

    let group = vault.get_group("general").unwrap();
    assert_eq!(group.order, 2);
    assert_eq!(group.icon.as_deref(), Some("star"));
    assert!(group.enabled);
}

#[test]
fn settings_and_counters_survive_reload() {
    let dir = TempDir::new().unwrap();
    {
        let mut vault = open(&dir);
        let settings = Settings {
            prefix: ";".to_string(),
            excluded_apps: vec!["com.vault.app".to_string()],
            history_limit: 50,
            ..Settings::default()
        };
        vault.save_settings(settings).unwrap();
        vault
            .update_counter(
                "invoice",
                Counter {
                    value: 41,
                    step: 2,
                    ..Counter::default()
                },
            )
            .unwrap();
    }

    let vault = open(&dir);
    assert_eq!(vault.settings().prefix, ";");
    assert_eq!(vault.settings().history_limit, 50);
    assert!(vault.settings().is_app_excluded("com.vault.app"));

    let counter = vault.get_counter("invoice").unwrap();
    assert_eq!(counter.value, 41);
    assert_eq!(counter.step, 2);
}

#[test]
fn history_limit_keeps_newest_entries_in_order() {
    let dir = TempDir::new().unwrap();
    let mut vault = open(&dir);
    let limit = 4;
    let mut settings = vault.settings().clone();
    settings.history_limit = limit;
    vault.save_settings(settings).unwrap();

    for n in 0..(limit + 3) {
        vault
            .add_history_entry(snipq_core::HistoryEntry {
                timestamp: chrono::Local::now(),
                snippet_id: format!("s{}", n),
                output: String::new(),
                used_params: Default::default(),
                app_id: None,
            })
            .unwrap();
    }

    let reloaded = open(&dir);
    let ids: Vec<&str> = reloaded
        .history()
        .iter()
        .map(|e| e.snippet_id.as_str())
        .collect();
    assert_eq!(ids, vec!["s3", "s4", "s5", "s6"]);
}

#[test]
fn history_limit_bounds_are_enforced() {
    let dir = TempDir::new().unwrap();
    let mut vault = open(&dir);

    for (limit, ok) in [(-1, false), (20_000, false), (100, true)] {
        let settings = Settings {
            history_limit: limit,
            ..Settings::default()
        };
        let result = vault.save_settings(settings);
        assert_eq!(result.is_ok(), ok, "limit {}", limit);
        if !ok {
            assert!(matches!(result, Err(SnipqError::Validation(_))));
        }
    }
}

#[test]
fn backup_then_restore_round_trips_vault() {
    let dir = TempDir::new().unwrap();
    let backups = TempDir::new().unwrap();
    let mut vault = open(&dir);

    vault.create_group(Group::new("general", "General")).unwrap();
    vault.upsert_snippet(sample_snippet()).unwrap();
    vault
        .update_counter(
            "ticket",
            Counter {
                value: 9,
                ..Counter::default()
            },
        )
        .unwrap();
    let mut settings = vault.settings().clone();
    settings.locale = "vi-VN".to_string();
    vault.save_settings(settings).unwrap();

    let backup = vault.backup_vault(backups.path()).unwrap();

    // diverge from the backup
    vault.create_group(Group::new("scratch", "Scratch")).unwrap();
    vault
        .upsert_snippet(Snippet::new("tmp", ":tmp", "temp", "scratch"))
        .unwrap();
    vault.delete_snippet("ty").unwrap();
    vault
        .update_counter(
            "ticket",
            Counter {
                value: 100,
                ..Counter::default()
            },
        )
        .unwrap();
    let mut settings = vault.settings().clone();
    settings.locale = "fr-FR".to_string();
    vault.save_settings(settings).unwrap();

    vault.restore_vault(&backup).unwrap();

    assert_eq!(vault.get_snippet("ty"), Some(&sample_snippet()));
    assert!(vault.get_snippet("tmp").is_none());
    assert!(vault.get_group("scratch").is_none());
    assert!(!dir.path().join("groups/scratch").exists());
    assert_eq!(vault.get_counter("ticket").unwrap().value, 9);
    assert_eq!(vault.settings().locale, "vi-VN");

    // the pre-restore state was kept aside
    let pre_restore = dir.path().join("backups/pre_restore");
    assert_eq!(std::fs::read_dir(pre_restore).unwrap().count(), 1);

    // and a fresh load sees the restored vault
    let fresh = open(&dir);
    assert_eq!(fresh.get_snippet("ty"), Some(&sample_snippet()));
}
