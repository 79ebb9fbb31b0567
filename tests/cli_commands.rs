//! Command-line entry points driven through `run_coordinator`.

mod support;

use capsync::cli::{Cli, run_coordinator};
use capsync::config::ConfigError;
use capsync::sync::SyncError;
use clap::Parser;
use support::capsync_env::CapsyncEnvGuard;
use support::fixtures::{PNG, Workspace};

fn cli(ws: &Workspace, extra: &[&str]) -> Cli {
    let config = ws.temp.path().join("capsync.toml");
    if !config.exists() {
        std::fs::write(&config, "[sync]\nbatch_delay_ms = 0\n").unwrap();
    }
    let mut args = vec![
        "capsync".to_string(),
        ws.base.display().to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "--store-path".to_string(),
        ws.store_path.display().to_string(),
    ];
    args.extend(extra.iter().map(|arg| arg.to_string()));
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn upload_without_remote_settings_exits_with_two() {
    let ws = Workspace::new();
    let _env = CapsyncEnvGuard::set_config_home(ws.temp.path().join("home"));
    ws.folder("Batch1", &[("a.png", PNG)]);

    let err = run_coordinator(&cli(&ws, &[])).unwrap_err();
    assert!(matches!(err, SyncError::Config(ConfigError::MissingRemote { .. })));
    assert_eq!(err.exit_code(), 2);
    assert!(!ws.base.join("Batch1").join("failed.json").exists());
}

#[test]
fn scan_only_records_folders_without_remote() {
    let ws = Workspace::new();
    let _env = CapsyncEnvGuard::set_config_home(ws.temp.path().join("home"));
    ws.folder("Batch1", &[("a.png", PNG)]);
    ws.folder("Batch2", &[("stats.json", b"{}")]);

    let out = run_coordinator(&cli(&ws, &["--scan-only"])).unwrap();
    assert!(out.starts_with("Scanned 2 folders"), "{out}");

    let status = run_coordinator(&cli(&ws, &["--status"])).unwrap();
    assert!(status.contains("Folder status (2 tracked)"), "{status}");
    assert!(status.contains("pending: 2"), "{status}");
}

#[test]
fn unknown_force_folder_is_rejected() {
    let ws = Workspace::new();
    let _env = CapsyncEnvGuard::set_config_home(ws.temp.path().join("home"));
    let config = ws.temp.path().join("capsync.toml");
    std::fs::write(
        &config,
        "[remote]\nurl = \"http://127.0.0.1:9\"\napi_key = \"k\"\n[remote.device]\nid = \"dev\"\n",
    )
    .unwrap();

    let err = run_coordinator(&cli(&ws, &["--force-folder", "Nope"])).unwrap_err();
    assert!(matches!(err, SyncError::InvalidBasePath(_)));
}
