//! Versioned Settings Integration Tests
//!
//! Tests for per-version settings directories:
//! - First run population
//! - Migration from the newest older version
//! - Refusal to overwrite existing settings
//! - Directory scanning edge cases

mod common;

use common::{PRODUCT, ServerEntry, TestFixture, VENDOR, default_servers, read_lines};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use verset::{Error, VersionedSettings};

// =============================================================================
// First Run
// =============================================================================

#[test]
fn test_first_run_populates_defaults_and_saves() {
    let fixture = TestFixture::new();
    let settings = fixture.open("1.0.0.0");

    let path = fixture.settings_path("1.0.0.0");
    assert_eq!(settings.settings_path(), path.as_path());
    assert!(path.exists());
    assert!(settings.migrated_from().is_none());
    assert!(!settings.is_modified());

    assert_eq!(settings.get::<Vec<ServerEntry>>("servers.list"), default_servers());
    assert_eq!(settings.get::<u32>("upload.connections"), 4);
    assert_eq!(read_lines(&path).len(), 3);
}

#[test]
fn test_existing_file_is_loaded_without_populate() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0.0.0", "ui.theme=\"light\"\n");

    let calls = AtomicUsize::new(0);
    let settings = fixture.open_with("1.0.0.0", true, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(settings.get::<String>("ui.theme"), "light");
}

#[test]
fn test_changes_persist_to_next_run() {
    let fixture = TestFixture::new();
    {
        let settings = fixture.open("1.0.0.0");
        settings.set("upload.connections", &16u32).unwrap();
        settings.save().unwrap();
    }

    let settings = fixture.open("1.0.0.0");
    assert_eq!(settings.get::<u32>("upload.connections"), 16);
}

#[test]
fn test_empty_populate_leaves_no_file() {
    let fixture = TestFixture::new();
    let settings = fixture.open_with("1.0", true, |_| Ok(()));

    assert!(settings.version_dir().is_dir());
    assert!(!fixture.settings_path("1.0").exists());
}

// =============================================================================
// Upgrade Selection
// =============================================================================

#[test]
fn test_upgrade_selects_newest_older_version() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0", "source=\"1.0\"\n");
    fixture.write_version("1.1", "source=\"1.1\"\nui.theme=\"light\"\n");

    let settings = fixture.open("2.0");

    assert_eq!(settings.migrated_from().unwrap().as_str(), "1.1");
    assert_eq!(settings.get::<String>("source"), "1.1");
    // Migrated values win over defaults; missing ones are filled in
    assert_eq!(settings.get::<String>("ui.theme"), "light");
    assert_eq!(settings.get::<u32>("upload.connections"), 4);

    let lines = read_lines(&fixture.settings_path("2.0"));
    assert!(lines.contains(&"source=\"1.1\"".to_string()));
    assert!(lines.contains(&"upload.connections=4".to_string()));
}

#[test]
fn test_upgrade_is_byte_for_byte_copy() {
    let fixture = TestFixture::new();
    let content = "Odd.Case=1\nnot a setting\nkeep=\"x=y\"\n";
    fixture.write_version("1.0", content);

    fixture.open_with("2.0", true, |_| Ok(()));

    // Nothing to add, so the copied file is never rewritten
    assert_eq!(fs::read_to_string(fixture.settings_path("2.0")).unwrap(), content);
}

#[test]
fn test_upgrade_uses_numeric_order() {
    let fixture = TestFixture::new();
    fixture.write_version("1.9", "source=\"1.9\"\n");
    fixture.write_version("1.10", "source=\"1.10\"\n");

    let settings = fixture.open("1.11");
    assert_eq!(settings.get::<String>("source"), "1.10");
}

#[test]
fn test_upgrade_ignores_unparseable_directories() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0", "source=\"1.0\"\n");
    fixture.write_version("backup", "source=\"backup\"\n");
    fixture.write_version("1.5-beta", "source=\"beta\"\n");

    let settings = fixture.open("2.0");
    assert_eq!(settings.get::<String>("source"), "1.0");
}

#[test]
fn test_no_upgrade_source_creates_nothing() {
    let fixture = TestFixture::new();
    let settings = fixture.open_with("2.0", false, |_| Ok(()));

    assert!(!settings.upgrade(false).unwrap());
    assert!(!fixture.settings_path("2.0").exists());
    assert_eq!(settings.installed_versions().unwrap().len(), 1);
}

#[test]
fn test_older_version_dir_without_file_is_not_a_source() {
    let fixture = TestFixture::new();
    fixture.create_version_dir("1.0");

    let settings = fixture.open_with("2.0", true, |_| Ok(()));
    assert!(settings.migrated_from().is_none());
    assert!(!fixture.settings_path("2.0").exists());
}

#[test]
fn test_upgrade_refuses_to_overwrite() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0", "source=\"1.0\"\n");
    let current = fixture.write_version("2.0", "source=\"2.0\"\n");

    let settings = fixture.open("2.0");
    assert!(!settings.upgrade(false).unwrap());
    assert_eq!(fs::read_to_string(&current).unwrap(), "source=\"2.0\"\n");
    assert_eq!(settings.get::<String>("source"), "2.0");
}

#[test]
fn test_forced_upgrade_overwrites_and_reloads() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0", "source=\"1.0\"\n");
    fixture.write_version("2.0", "source=\"2.0\"\n");

    let settings = fixture.open("2.0");
    assert!(settings.upgrade(true).unwrap());
    assert_eq!(settings.get::<String>("source"), "1.0");
    assert_eq!(settings.migrated_from().unwrap().as_str(), "1.0");
    assert!(!settings.is_modified());
}

#[test]
fn test_upgrade_disabled_uses_defaults_only() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0", "ui.theme=\"light\"\n");

    let settings = fixture.open_with("2.0", false, common::populate_defaults);
    assert!(settings.migrated_from().is_none());
    assert_eq!(settings.get::<String>("ui.theme"), "dark");
}

#[test]
fn test_upgrade_copy_failure_propagates() {
    let fixture = TestFixture::new();
    fixture.write_version("1.0", "a=1\n");

    let settings = fixture.open_with("2.0", false, |_| Ok(()));
    // A directory where the settings file should go makes the copy fail
    fs::create_dir_all(fixture.settings_path("2.0")).unwrap();

    let err = settings.upgrade(true).unwrap_err();
    assert!(matches!(err, Error::FileCopy { .. }));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_custom_settings_file_name() {
    let fixture = TestFixture::new();
    let old = fixture.base_dir().join("1.0");
    fs::create_dir_all(&old).unwrap();
    fs::write(old.join("settings.ini"), "source=\"ini\"\n").unwrap();

    let settings = VersionedSettings::builder(VENDOR, PRODUCT, "2.0")
        .config_root(fixture.root())
        .settings_file("settings.ini")
        .build(|_| Ok(()))
        .unwrap();

    assert!(settings.settings_path().ends_with("2.0/settings.ini"));
    assert_eq!(settings.get::<String>("source"), "ini");
}

#[test]
fn test_invalid_running_version_is_rejected() {
    let fixture = TestFixture::new();
    let result = VersionedSettings::builder(VENDOR, PRODUCT, "v2")
        .config_root(fixture.root())
        .build(|_| Ok(()));
    assert!(matches!(result, Err(Error::InvalidVersion(_))));
    assert!(!fixture.base_dir().exists());
}
