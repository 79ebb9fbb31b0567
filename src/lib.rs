//! Library exports for the capsync binaries, benchmarks and tests.
/// Application directory resolution.
pub mod app_dirs;
/// Capture folder discovery, fingerprints and readiness.
pub mod capture;
/// Command-line front ends.
pub mod cli;
/// Runtime configuration.
pub mod config;
/// Shared HTTP agent and retry helpers.
pub(crate) mod http_client;
/// Logging setup.
pub mod logging;
/// Remote store client.
pub mod remote;
/// Batch coordination and watcher triggers.
pub mod sync;
/// SQLite upload tracking.
pub mod tracking;
/// New-folder watching.
pub mod watch;
