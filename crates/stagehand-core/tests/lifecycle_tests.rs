//! Integration tests for the full install lifecycle.
//!
//! These drive the public API the way a host packaging tool would:
//! preflight, postflight, the uninstall hooks, and zap, all against a
//! staged bundle inside a temporary root.

use stagehand_core::elevate::FakeMechanism;
use stagehand_core::{
    ArtifactPlan, BundleManifest, ElevationPolicy, Integrator, PlanRunner, ReceiptStore, Stage,
    StagehandError, SystemPaths,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BRAVE_MANIFEST: &str = r#"{
    "token": "brave-browser",
    "appName": "Brave Web Browser",
    "version": "1.64.109",
    "binary": {
        "source": "opt/brave.com/brave/brave-browser",
        "linkName": "brave-browser"
    },
    "suidHelpers": ["opt/brave.com/brave/chrome-sandbox"],
    "desktop": {
        "generate": {
            "name": "Brave Web Browser",
            "genericName": "Web Browser",
            "execArgs": "%U",
            "icon": "brave-browser",
            "categories": ["Network", "WebBrowser"],
            "startupNotify": true,
            "actions": [
                { "id": "new-window", "name": "New Window" },
                { "id": "new-private-window", "name": "New Incognito Window", "execArgs": "--incognito" }
            ]
        }
    },
    "icons": {
        "iconName": "brave-browser",
        "sourcePattern": "opt/brave.com/brave/product_logo_{size}.png",
        "sizes": [16, 24, 32, 48, 64, 128, 256]
    },
    "policy": {
        "kind": "polkitAction",
        "source": "opt/brave.com/brave/com.brave.Browser.policy",
        "destName": "com.brave.Browser.policy"
    },
    "caveats": "Brave is installed to ${prefix}/bin/brave-browser.",
    "zap": ["~/.config/BraveSoftware", "~/.cache/BraveSoftware"]
}"#;

struct TestEnv {
    temp: TempDir,
    stage: Stage,
    paths: SystemPaths,
    manifest: BundleManifest,
}

/// Staged Brave-like bundle plus home, prefix, and a redirected polkit
/// directory inside one temp root. Icon size 256 is deliberately not
/// staged.
fn create_test_env() -> TestEnv {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let stage_root = temp.path().join("stage");
    let bundle = stage_root.join("opt/brave.com/brave");
    fs::create_dir_all(&bundle).unwrap();
    fs::write(bundle.join("brave-browser"), b"#!/bin/sh\nexit 0\n").unwrap();
    fs::write(bundle.join("chrome-sandbox"), b"sandbox").unwrap();
    for size in [16u32, 24, 32, 48, 64, 128] {
        fs::write(bundle.join(format!("product_logo_{size}.png")), b"png").unwrap();
    }
    fs::write(bundle.join("com.brave.Browser.policy"), b"<policyconfig/>").unwrap();

    let home = temp.path().join("home");
    fs::create_dir_all(&home).unwrap();
    let mut paths = SystemPaths::rooted(&home, home.join(".pkgs"));
    paths.polkit_actions_dir = temp.path().join("system/polkit-1/actions");

    TestEnv {
        stage: Stage::open(&stage_root).unwrap(),
        manifest: BundleManifest::from_json(BRAVE_MANIFEST).unwrap(),
        paths,
        temp,
    }
}

fn integrator(env: &TestEnv, policy: ElevationPolicy) -> Integrator {
    Integrator::new(
        env.manifest.clone(),
        env.stage.clone(),
        env.paths.clone(),
        policy,
    )
}

/// Every regular file under `root`, sorted.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, files);
            } else {
                files.push(path);
            }
        }
    }
    let mut files = Vec::new();
    walk(root, &mut files);
    files.sort();
    files
}

#[test]
fn test_install_without_elevation_places_user_artifacts() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    integrator.preflight().unwrap();
    let report = integrator.postflight().unwrap();

    // suid fixup + binary + desktop entry + 6 staged icons
    assert_eq!(report.placed.len(), 9);
    // icon size 256 and the elevated policy file
    assert_eq!(report.skipped.len(), 2);
    assert!(!report.is_clean());
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("elevation mechanism")));

    let bin = env.paths.bin_dir().join("brave-browser");
    assert!(bin.symlink_metadata().is_ok());

    let entry_path = env.paths.applications_dir.join("brave-browser.desktop");
    let entry = fs::read_to_string(&entry_path).unwrap();
    assert!(entry.contains("Name=Brave Web Browser\n"));
    assert!(entry.contains(&format!("Exec={} %U\n", bin.display())));
    assert!(entry.contains("Actions=new-window;new-private-window;\n"));
    assert!(entry.contains("[Desktop Action new-private-window]\n"));
    assert!(stagehand_core::platform::permissions::is_executable(
        &entry_path
    ));

    for size in [16u32, 24, 32, 48, 64, 128] {
        assert!(env
            .paths
            .hicolor_size_dir(size)
            .join("brave-browser.png")
            .is_file());
    }
    assert!(report
        .skipped
        .iter()
        .any(|p| p.ends_with("256x256/apps/brave-browser.png")));

    // The policy file stayed out, a setup script took its place.
    assert!(!env
        .paths
        .polkit_actions_dir
        .join("com.brave.Browser.policy")
        .exists());
    let script = env.paths.bin_dir().join("brave-browser-policy-setup");
    let script_text = fs::read_to_string(&script).unwrap();
    assert!(script_text.contains("polkit action"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let sandbox = env
            .stage
            .resolve(Path::new("opt/brave.com/brave/chrome-sandbox"));
        let mode = fs::metadata(&sandbox).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o4755);
        assert!(stagehand_core::platform::permissions::is_suid(&sandbox));
    }
}

#[test]
fn test_install_writes_receipt() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    integrator.preflight().unwrap();
    let report = integrator.postflight().unwrap();

    let receipt = ReceiptStore::new(&env.paths).load().unwrap().unwrap();
    assert_eq!(receipt.token, "brave-browser");
    assert_eq!(receipt.version, "1.64.109");
    assert_eq!(receipt.artifacts.len(), report.placed.len());
    assert!(receipt.artifacts.iter().all(|a| !a.elevated));
    assert!(!receipt.warnings.is_empty());
}

#[test]
fn test_uninstall_restores_filesystem() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    let before = collect_files(&env.paths.home);
    assert!(before.is_empty());

    integrator.preflight().unwrap();
    integrator.postflight().unwrap();
    assert!(!collect_files(&env.paths.home).is_empty());

    integrator.uninstall_preflight().unwrap();
    let report = integrator.uninstall_postflight().unwrap();
    assert!(report.is_clean());

    assert_eq!(collect_files(&env.paths.home), before);
    // Apply-created directory trees are gone too.
    assert!(!env.paths.applications_dir.exists());
    assert!(!env.paths.icon_theme_dir.exists());
    assert!(env.paths.home.exists());
}

#[test]
fn test_uninstall_hooks_are_idempotent() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    integrator.preflight().unwrap();
    integrator.postflight().unwrap();

    integrator.uninstall_preflight().unwrap();
    let first = integrator.uninstall_postflight().unwrap();
    assert!(!first.removed.is_empty());

    integrator.uninstall_preflight().unwrap();
    let second = integrator.uninstall_postflight().unwrap();
    assert!(second.is_clean());
    assert!(second.removed.is_empty());
}

#[test]
fn test_uninstall_of_never_installed_bundle_succeeds() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    integrator.uninstall_preflight().unwrap();
    let report = integrator.uninstall_postflight().unwrap();
    assert!(report.is_clean());
    assert!(report.removed.is_empty());
}

#[test]
fn test_postflight_without_preflight_skips_desktop_entry() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    // No preflight, so the generated entry was never rendered.
    let report = integrator.postflight().unwrap();

    assert!(report
        .skipped
        .iter()
        .any(|p| p.ends_with("brave-browser.desktop")));
    assert!(env
        .paths
        .bin_dir()
        .join("brave-browser")
        .symlink_metadata()
        .is_ok());
}

#[test]
fn test_elevated_batch_is_single_invocation() {
    let env = create_test_env();
    let plan = ArtifactPlan::build(&env.manifest, env.stage.root(), &env.paths).unwrap();
    let (direct, elevated) = plan.split_by_elevation();
    assert_eq!(direct.len(), 10);
    assert_eq!(elevated.len(), 1);

    let fake = FakeMechanism::executing();
    let runner = PlanRunner::new(env.stage.clone(), env.paths.clone(), Box::new(fake.clone()));
    let report = runner.apply(&plan).unwrap();

    assert!(report.is_clean());
    assert_eq!(fake.invocation_count(), 1);
    let policy_file = env.paths.polkit_actions_dir.join("com.brave.Browser.policy");
    assert!(policy_file.is_file());
    assert!(fake.recorded()[0].starts_with("#!/bin/sh"));

    let revert_report = runner.revert(&plan).unwrap();
    assert!(revert_report.is_clean());
    assert_eq!(fake.invocation_count(), 2);
    assert!(!policy_file.exists());
}

#[test]
fn test_denied_elevation_is_a_warning() {
    let env = create_test_env();
    let plan = ArtifactPlan::build(&env.manifest, env.stage.root(), &env.paths).unwrap();

    let fake = FakeMechanism::denying(126);
    let runner = PlanRunner::new(env.stage.clone(), env.paths.clone(), Box::new(fake.clone()));
    let report = runner.apply(&plan).unwrap();

    assert!(!report.is_clean());
    assert!(report.warnings.iter().any(|w| w.contains("denied")));
    assert!(!env
        .paths
        .polkit_actions_dir
        .join("com.brave.Browser.policy")
        .exists());
    // The binary landed regardless.
    assert!(env
        .paths
        .bin_dir()
        .join("brave-browser")
        .symlink_metadata()
        .is_ok());
}

#[test]
fn test_plan_is_pure_and_deterministic() {
    let env = create_test_env();
    let ghost_root = env.temp.path().join("never-created");

    let first = ArtifactPlan::build(&env.manifest, &ghost_root, &env.paths).unwrap();
    let second = ArtifactPlan::build(&env.manifest, &ghost_root, &env.paths).unwrap();
    assert_eq!(first, second);
    assert!(!ghost_root.exists());
}

#[test]
fn test_malformed_source_path_is_config_error() {
    let json = BRAVE_MANIFEST.replace(
        "opt/brave.com/brave/brave-browser",
        "../outside/the/stage",
    );
    let err = BundleManifest::from_json(&json).unwrap_err();
    assert!(matches!(err, StagehandError::Config { .. }));
}

#[test]
fn test_zap_runs_only_when_asked() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    let config_dir = env.paths.home.join(".config/BraveSoftware");
    fs::create_dir_all(config_dir.join("Brave-Browser")).unwrap();
    fs::write(config_dir.join("Brave-Browser/Preferences"), b"{}").unwrap();

    integrator.preflight().unwrap();
    integrator.postflight().unwrap();
    integrator.uninstall_preflight().unwrap();
    integrator.uninstall_postflight().unwrap();

    // Uninstall leaves user data alone.
    assert!(config_dir.exists());

    let removed = integrator.zap().unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!config_dir.exists());
}

#[test]
fn test_caveats_mention_install_paths() {
    let env = create_test_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    let caveats = integrator.caveats().unwrap();
    assert!(caveats.contains("/bin/brave-browser"));
    assert!(!caveats.contains("${prefix}"));
}

const BITWARDEN_MANIFEST: &str = r#"{
    "token": "bitwarden",
    "appName": "Bitwarden",
    "version": "2024.4.1",
    "binary": {
        "source": "opt/Bitwarden/bitwarden",
        "linkName": "bitwarden"
    },
    "desktop": {
        "source": "usr/share/applications/bitwarden.desktop",
        "replacements": [
            { "key": "Exec", "value": "${prefix}/bin/bitwarden %U" },
            { "key": "Icon", "value": "bitwarden" }
        ]
    },
    "icons": {
        "iconName": "bitwarden",
        "flatSource": "usr/share/icons/bitwarden.png"
    },
    "policy": {
        "kind": "apparmor",
        "source": "usr/share/apparmor/bitwarden",
        "destName": "bitwarden"
    },
    "zap": ["~/.config/Bitwarden"]
}"#;

const BITWARDEN_DESKTOP: &str = "[Desktop Entry]\n\
Name=Bitwarden\n\
Comment=A secure and free password manager\n\
# Shipped by the vendor\n\
TryExec=/opt/Bitwarden/bitwarden\n\
Exec=/opt/Bitwarden/bitwarden %U\n\
Icon=/opt/Bitwarden/resources/icon.png\n\
Type=Application\n\
Categories=Utility;\n";

fn create_bitwarden_env() -> TestEnv {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let stage_root = temp.path().join("stage");
    fs::create_dir_all(stage_root.join("opt/Bitwarden")).unwrap();
    fs::create_dir_all(stage_root.join("usr/share/applications")).unwrap();
    fs::create_dir_all(stage_root.join("usr/share/icons")).unwrap();
    fs::create_dir_all(stage_root.join("usr/share/apparmor")).unwrap();
    fs::write(stage_root.join("opt/Bitwarden/bitwarden"), b"bin").unwrap();
    fs::write(
        stage_root.join("usr/share/applications/bitwarden.desktop"),
        BITWARDEN_DESKTOP,
    )
    .unwrap();
    fs::write(stage_root.join("usr/share/icons/bitwarden.png"), b"png").unwrap();
    fs::write(stage_root.join("usr/share/apparmor/bitwarden"), b"profile").unwrap();

    let home = temp.path().join("home");
    fs::create_dir_all(&home).unwrap();
    let paths = SystemPaths::rooted(&home, home.join(".pkgs"));

    TestEnv {
        stage: Stage::open(&stage_root).unwrap(),
        manifest: BundleManifest::from_json(BITWARDEN_MANIFEST).unwrap(),
        paths,
        temp,
    }
}

#[test]
fn test_patch_flow_rewrites_only_declared_keys() {
    let env = create_bitwarden_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    integrator.preflight().unwrap();

    let staged = env
        .stage
        .resolve(Path::new("usr/share/applications/bitwarden.desktop"));
    let patched = fs::read_to_string(&staged).unwrap();
    let expected = BITWARDEN_DESKTOP
        .replace(
            "Exec=/opt/Bitwarden/bitwarden %U",
            &format!("Exec={}/bin/bitwarden %U", env.paths.prefix.display()),
        )
        .replace("Icon=/opt/Bitwarden/resources/icon.png", "Icon=bitwarden");
    assert_eq!(patched, expected);

    // TryExec shares a suffix with Exec but is not a declared key.
    assert!(patched.contains("TryExec=/opt/Bitwarden/bitwarden\n"));

    // Patching again changes nothing.
    integrator.preflight().unwrap();
    assert_eq!(fs::read_to_string(&staged).unwrap(), expected);
}

#[test]
fn test_patched_entry_and_flat_icon_install() {
    let env = create_bitwarden_env();
    let integrator = integrator(&env, ElevationPolicy::Disabled);

    integrator.preflight().unwrap();
    let report = integrator.postflight().unwrap();

    let entry = fs::read_to_string(env.paths.applications_dir.join("bitwarden.desktop")).unwrap();
    assert!(entry.contains(&format!(
        "Exec={}/bin/bitwarden %U\n",
        env.paths.prefix.display()
    )));
    assert!(env.paths.flat_icon_dir.join("bitwarden.png").is_file());

    // AppArmor profile could not be placed without elevation.
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("bitwarden-policy-setup")));
    let script = fs::read_to_string(env.paths.bin_dir().join("bitwarden-policy-setup")).unwrap();
    assert!(script.contains("apparmor_parser --replace --write-cache --skip-read-cache"));
}
