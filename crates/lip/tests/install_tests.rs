//! Integration tests for installing and uninstalling teeth

mod common;

use common::{context, manifest, write_tooth, FakeRegistry};
use lip::archive::Archive;
use lip::commands::{
    install_specifiers, list_installed, list_upgradable, uninstall_teeth, InstallOptions, PlanError,
    UninstallError,
};
use lip::installer::{install, uninstall, InstallError};
use lip::resolver::ResolverError;
use lip::store::RecordStore;
use lip::Version;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tool_manifest(version: &str) -> Value {
    let mut value = manifest("example.com/org/tool", version, &[]);
    value["files"] = json!({
        "place": [
            { "src": "bin/*", "dest": "tools/bin/" },
            { "src": "config.toml", "dest": "tools/config.toml" }
        ],
        "preserve": ["tools/config.toml"],
        "remove": ["tools/cache"]
    });
    value
}

fn tool_archive(dir: &Path, version: &str) -> Archive {
    let path = write_tooth(
        dir,
        &tool_manifest(version),
        &[
            ("bin/tool", "binary"),
            ("bin/helpers/run", "helper"),
            ("config.toml", "key = 1"),
        ],
    );
    Archive::open(&path).unwrap()
}

#[test]
fn test_install_places_files_and_writes_record() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());

    install(&ctx, &tool_archive(temp.path(), "1.0.0")).unwrap();

    let ws = ctx.workspace_dir();
    assert_eq!(fs::read_to_string(ws.join("tools/bin/tool")).unwrap(), "binary");
    assert_eq!(fs::read_to_string(ws.join("tools/bin/helpers/run")).unwrap(), "helper");
    assert_eq!(fs::read_to_string(ws.join("tools/config.toml")).unwrap(), "key = 1");

    let store = RecordStore::new(ctx.metadata_dir());
    let record = store.get_installed("example.com/org/tool").unwrap().unwrap();
    assert_eq!(record.version(), &Version::new(1, 0, 0));
    // Records hold expanded placements
    assert_eq!(record.files().place.len(), 3);
}

#[test]
fn test_install_twice_fails() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let archive = tool_archive(temp.path(), "1.0.0");

    install(&ctx, &archive).unwrap();
    assert!(matches!(install(&ctx, &archive), Err(InstallError::AlreadyInstalled(_))));
}

#[test]
fn test_install_conflicting_destination() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let ws = ctx.workspace_dir();
    fs::create_dir_all(ws.join("tools/bin")).unwrap();
    fs::write(ws.join("tools/bin/tool"), "someone else's").unwrap();

    let result = install(&ctx, &tool_archive(temp.path(), "1.0.0"));
    assert!(matches!(result, Err(InstallError::DestinationExists(_))));
    assert_eq!(fs::read_to_string(ws.join("tools/bin/tool")).unwrap(), "someone else's");
    assert!(!RecordStore::new(ctx.metadata_dir()).is_installed("example.com/org/tool"));
}

#[test]
fn test_install_missing_source_fails() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut value = manifest("example.com/org/broken", "1.0.0", &[]);
    value["files"] = json!({ "place": [{ "src": "missing.txt", "dest": "missing.txt" }] });
    let archive = Archive::open(&write_tooth(temp.path(), &value, &[])).unwrap();

    assert!(matches!(install(&ctx, &archive), Err(InstallError::ArchiveError(_))));
}

#[test]
fn test_uninstall_removes_files_and_empty_directories() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let ws = ctx.workspace_dir();

    install(&ctx, &tool_archive(temp.path(), "1.0.0")).unwrap();
    uninstall(&ctx, "example.com/org/tool").unwrap();

    assert!(!ws.join("tools/bin").exists());
    // Preserved file keeps its directory alive
    assert_eq!(fs::read_to_string(ws.join("tools/config.toml")).unwrap(), "key = 1");
    assert!(ws.is_dir());
    assert!(!RecordStore::new(ctx.metadata_dir()).is_installed("example.com/org/tool"));
}

#[test]
fn test_uninstall_keeps_foreign_files() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let ws = ctx.workspace_dir();

    install(&ctx, &tool_archive(temp.path(), "1.0.0")).unwrap();
    fs::write(ws.join("tools/bin/user-notes.txt"), "mine").unwrap();
    uninstall(&ctx, "example.com/org/tool").unwrap();

    assert!(!ws.join("tools/bin/tool").exists());
    assert!(!ws.join("tools/bin/helpers").exists());
    assert!(ws.join("tools/bin/user-notes.txt").exists());
}

#[test]
fn test_remove_takes_precedence_over_preserve() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let ws = ctx.workspace_dir();

    let mut value = manifest("example.com/org/data", "1.0.0", &[]);
    value["files"] = json!({
        "place": [{ "src": "data.db", "dest": "data/data.db" }],
        "preserve": ["data/data.db", "data/cache"],
        "remove": ["data/cache"]
    });
    let archive = Archive::open(&write_tooth(temp.path(), &value, &[("data.db", "db")])).unwrap();

    install(&ctx, &archive).unwrap();
    fs::create_dir_all(ws.join("data/cache/nested")).unwrap();
    fs::write(ws.join("data/cache/nested/blob"), "x").unwrap();

    uninstall(&ctx, "example.com/org/data").unwrap();

    assert!(ws.join("data/data.db").exists());
    assert!(!ws.join("data/cache").exists());
}

#[test]
fn test_uninstall_not_installed() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());

    let result = uninstall(&ctx, "example.com/org/ghost");
    assert!(matches!(result, Err(InstallError::NotInstalled(_))));
}

#[test]
fn test_install_then_uninstall_restores_workspace() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let ws = ctx.workspace_dir();

    let mut value = manifest("example.com/org/clean", "1.0.0", &[]);
    value["files"] = json!({ "place": [{ "src": "lib/*", "dest": "deep/tree/" }] });
    let archive = Archive::open(&write_tooth(
        temp.path(),
        &value,
        &[("lib/a.so", "a"), ("lib/x/b.so", "b")],
    ))
    .unwrap();

    install(&ctx, &archive).unwrap();
    uninstall(&ctx, "example.com/org/clean").unwrap();

    let leftovers: Vec<_> = fs::read_dir(ws)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|name| name != ".lip")
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[cfg(unix)]
#[test]
fn test_lifecycle_commands_run_in_order() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let ws = ctx.workspace_dir();

    let mut value = manifest("example.com/org/hooks", "1.0.0", &[]);
    value["commands"] = json!({
        "pre_install": ["echo pre_install >> log.txt"],
        "post_install": ["test -f hook.txt && echo post_install >> log.txt"],
        "pre_uninstall": ["echo pre_uninstall >> log.txt"],
        "post_uninstall": ["test ! -f hook.txt && echo post_uninstall >> log.txt"]
    });
    value["files"] = json!({ "place": [{ "src": "hook.txt", "dest": "hook.txt" }] });
    let archive = Archive::open(&write_tooth(temp.path(), &value, &[("hook.txt", "h")])).unwrap();

    install(&ctx, &archive).unwrap();
    uninstall(&ctx, "example.com/org/hooks").unwrap();

    let log = fs::read_to_string(ws.join("log.txt")).unwrap();
    assert_eq!(
        log.lines().collect::<Vec<_>>(),
        vec!["pre_install", "post_install", "pre_uninstall", "post_uninstall"]
    );
}

#[cfg(unix)]
#[test]
fn test_failing_pre_install_aborts() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());

    let mut value = manifest("example.com/org/fails", "1.0.0", &[]);
    value["commands"] = json!({ "pre_install": ["exit 1"] });
    value["files"] = json!({ "place": [{ "src": "f.txt", "dest": "f.txt" }] });
    let archive = Archive::open(&write_tooth(temp.path(), &value, &[("f.txt", "f")])).unwrap();

    let result = install(&ctx, &archive);
    assert!(matches!(result, Err(InstallError::CommandFailed { .. })));
    assert!(!ctx.workspace_dir().join("f.txt").exists());
    assert!(!RecordStore::new(ctx.metadata_dir()).is_installed("example.com/org/fails"));
}

fn publish_app(registry: &mut FakeRegistry, dir: &Path) {
    let mut lib = manifest("example.com/org/lib", "1.1.0", &[]);
    lib["files"] = json!({ "place": [{ "src": "lib.txt", "dest": "lib.txt" }] });
    registry.publish(dir, lib, &[("lib.txt", "lib")]);

    let mut app = manifest("example.com/org/app", "1.0.0", &[("example.com/org/lib", ">=1.0.0 <2.0.0")]);
    app["files"] = json!({ "place": [{ "src": "app.txt", "dest": "app.txt" }] });
    registry.publish(dir, app, &[("app.txt", "app")]);
}

#[test]
fn test_install_specifiers_with_dependencies() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();
    publish_app(&mut registry, temp.path());

    let report = install_specifiers(
        &ctx,
        &registry,
        &["example.com/org/app".to_string()],
        InstallOptions::default(),
    )
    .unwrap();

    // Dependencies are installed first
    assert_eq!(report.installed, vec!["example.com/org/lib@1.1.0", "example.com/org/app@1.0.0"]);
    assert!(ctx.workspace_dir().join("lib.txt").exists());
    assert!(ctx.workspace_dir().join("app.txt").exists());

    let installed: Vec<String> = list_installed(&ctx)
        .unwrap()
        .iter()
        .map(|m| m.repo().to_string())
        .collect();
    assert_eq!(installed, vec!["example.com/org/app", "example.com/org/lib"]);

    // A second run is a no-op
    let again = install_specifiers(
        &ctx,
        &registry,
        &["example.com/org/app@1.0.0".to_string()],
        InstallOptions::default(),
    )
    .unwrap();
    assert!(again.installed.is_empty());
    assert_eq!(again.skipped, vec!["example.com/org/app@1.0.0"]);
}

#[test]
fn test_install_specifiers_without_dependencies() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();
    publish_app(&mut registry, temp.path());

    let options = InstallOptions {
        no_dependencies: true,
        ..Default::default()
    };
    let report = install_specifiers(&ctx, &registry, &["example.com/org/app".to_string()], options)
        .unwrap();

    assert_eq!(report.installed, vec!["example.com/org/app@1.0.0"]);
    assert!(!ctx.workspace_dir().join("lib.txt").exists());
}

#[test]
fn test_install_from_archive_path() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let registry = FakeRegistry::new();

    let path = write_tooth(temp.path(), &tool_manifest("1.0.0"), &[("bin/tool", "x"), ("config.toml", "y")]);
    let report = install_specifiers(
        &ctx,
        &registry,
        &[path.to_string_lossy().into_owned()],
        InstallOptions::default(),
    )
    .unwrap();

    assert_eq!(report.installed, vec!["example.com/org/tool@1.0.0"]);
}

#[test]
fn test_missing_prerequisites_are_reported_together() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();

    let mut value = manifest("example.com/org/plugin", "1.0.0", &[]);
    value["prerequisites"] = json!({
        "example.com/org/runtime": ">=2.0.0",
        "example.com/org/loader": "1.0.x"
    });
    registry.publish(temp.path(), value, &[]);

    let result = install_specifiers(
        &ctx,
        &registry,
        &["example.com/org/plugin".to_string()],
        InstallOptions::default(),
    );

    match result {
        Err(PlanError::MissingPrerequisites(missing)) => {
            assert_eq!(missing.len(), 2);
            assert_eq!(missing["example.com/org/runtime"], ">=2.0.0");
            assert_eq!(missing["example.com/org/loader"], "1.0.x");
        }
        other => panic!("expected missing prerequisites, got {:?}", other),
    }
    assert!(list_installed(&ctx).unwrap().is_empty());
}

#[test]
fn test_prerequisite_satisfied_by_pending_install() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();

    registry.publish(temp.path(), manifest("example.com/org/runtime", "2.1.0", &[]), &[]);
    let mut plugin = manifest("example.com/org/plugin", "1.0.0", &[]);
    plugin["prerequisites"] = json!({ "example.com/org/runtime": ">=2.0.0" });
    registry.publish(temp.path(), plugin, &[]);

    let report = install_specifiers(
        &ctx,
        &registry,
        &["example.com/org/runtime".to_string(), "example.com/org/plugin".to_string()],
        InstallOptions::default(),
    )
    .unwrap();
    assert_eq!(report.installed.len(), 2);
}

#[test]
fn test_upgrade_replaces_installed_version() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();

    let v1_dir = temp.path().join("v1");
    let v2_dir = temp.path().join("v2");
    fs::create_dir_all(&v1_dir).unwrap();
    fs::create_dir_all(&v2_dir).unwrap();
    let release = |version: &str| {
        let mut value = manifest("example.com/org/tool", version, &[]);
        value["files"] = json!({ "place": [{ "src": "bin/*", "dest": "tools/bin/" }] });
        value
    };
    registry.publish(&v1_dir, release("1.0.0"), &[("bin/old", "1")]);
    registry.publish(&v2_dir, release("2.0.0"), &[("bin/new", "2")]);

    install_specifiers(
        &ctx,
        &registry,
        &["example.com/org/tool@1.0.0".to_string()],
        InstallOptions::default(),
    )
    .unwrap();

    let upgradable = list_upgradable(&ctx, &registry).unwrap();
    assert_eq!(upgradable.len(), 1);
    assert_eq!(upgradable[0].latest, Version::new(2, 0, 0));

    let options = InstallOptions {
        upgrade: true,
        ..Default::default()
    };
    let report = install_specifiers(&ctx, &registry, &["example.com/org/tool".to_string()], options)
        .unwrap();

    assert_eq!(report.reinstalled, vec!["example.com/org/tool@2.0.0"]);
    let ws = ctx.workspace_dir();
    assert!(!ws.join("tools/bin/old").exists());
    assert!(ws.join("tools/bin/new").exists());
    assert!(list_upgradable(&ctx, &registry).unwrap().is_empty());
}

#[test]
fn test_upgrade_keeps_preserved_files() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();
    let files = [("bin/tool", "binary"), ("config.toml", "key = 1")];
    registry.publish(temp.path(), tool_manifest("1.0.0"), &files);
    registry.publish(temp.path(), tool_manifest("2.0.0"), &files);

    install_specifiers(
        &ctx,
        &registry,
        &["example.com/org/tool@1.0.0".to_string()],
        InstallOptions::default(),
    )
    .unwrap();
    let ws = ctx.workspace_dir();
    fs::write(ws.join("tools/config.toml"), "key = 2").unwrap();

    let options = InstallOptions {
        upgrade: true,
        ..Default::default()
    };
    let report = install_specifiers(&ctx, &registry, &["example.com/org/tool".to_string()], options)
        .unwrap();
    assert_eq!(report.reinstalled, vec!["example.com/org/tool@2.0.0"]);

    assert_eq!(fs::read_to_string(ws.join("tools/config.toml")).unwrap(), "key = 2");
    assert_eq!(fs::read_to_string(ws.join("tools/bin/tool")).unwrap(), "binary");

    let installed = list_installed(&ctx).unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].version(), &Version::new(2, 0, 0));

    // Forcing the same version again keeps the file as well
    let options = InstallOptions {
        force_reinstall: true,
        ..Default::default()
    };
    let report = install_specifiers(&ctx, &registry, &["example.com/org/tool@2.0.0".to_string()], options)
        .unwrap();
    assert_eq!(report.reinstalled, vec!["example.com/org/tool@2.0.0"]);
    assert_eq!(fs::read_to_string(ws.join("tools/config.toml")).unwrap(), "key = 2");
}

#[test]
fn test_reinstall_still_rejects_foreign_destinations() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    install(&ctx, &tool_archive(temp.path(), "1.0.0")).unwrap();

    let other_dir = temp.path().join("other");
    fs::create_dir_all(&other_dir).unwrap();
    let mut value = tool_manifest("2.0.0");
    value["files"]["place"] = json!([
        { "src": "bin/*", "dest": "tools/bin/" },
        { "src": "notes.txt", "dest": "notes.txt" }
    ]);
    let path = write_tooth(&other_dir, &value, &[("bin/tool", "binary"), ("notes.txt", "new")]);

    fs::write(ctx.workspace_dir().join("notes.txt"), "mine").unwrap();
    let result = lip::installer::reinstall(&ctx, &Archive::open(&path).unwrap());
    assert!(matches!(result, Err(InstallError::DestinationExists(_))));
    assert_eq!(fs::read_to_string(ctx.workspace_dir().join("notes.txt")).unwrap(), "mine");
}

#[test]
fn test_no_dependencies_still_checks_root_versions() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());
    let mut registry = FakeRegistry::new();
    registry.publish(temp.path(), manifest("example.com/org/pkg", "1.0.0", &[]), &[]);
    registry.publish(temp.path(), manifest("example.com/org/pkg", "2.0.0", &[]), &[]);

    let specifiers = [
        "example.com/org/pkg@1.0.0".to_string(),
        "example.com/org/pkg@2.0.0".to_string(),
    ];
    let options = InstallOptions {
        no_dependencies: true,
        ..Default::default()
    };
    let result = install_specifiers(&ctx, &registry, &specifiers, options.clone());
    assert!(matches!(
        result,
        Err(PlanError::ResolverError(ResolverError::FixedVersionConflict { .. }))
    ));
    assert!(list_installed(&ctx).unwrap().is_empty());

    let report = install_specifiers(
        &ctx,
        &registry,
        &specifiers,
        InstallOptions {
            upgrade: true,
            ..options
        },
    )
    .unwrap();
    assert_eq!(report.installed, vec!["example.com/org/pkg@2.0.0"]);
}

#[test]
fn test_uninstall_teeth_checks_all_first() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path());

    install(&ctx, &tool_archive(temp.path(), "1.0.0")).unwrap();

    let result = uninstall_teeth(
        &ctx,
        &["example.com/org/tool".to_string(), "example.com/org/ghost".to_string()],
    );
    match result {
        Err(UninstallError::NotInstalled(unknown)) => {
            assert_eq!(unknown, vec!["example.com/org/ghost"]);
        }
        other => panic!("expected not installed, got {:?}", other),
    }
    assert!(RecordStore::new(ctx.metadata_dir()).is_installed("example.com/org/tool"));

    let removed = uninstall_teeth(&ctx, &["example.com/org/tool".to_string()]).unwrap();
    assert_eq!(removed, vec!["example.com/org/tool"]);
}
