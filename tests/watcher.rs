//! Hot-reload tests against real files in a temp directory.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, next_within, write_config};
use ruleconf::{
    ConfigError, FieldDescriptor, Loader, Record, Rule, RuleRegistry, Violation, WatchOptions,
    Watcher, WatcherState,
};
use serde::Deserialize;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize, Record)]
struct AppConfig {
    #[validate("required,min=1,max=65535")]
    port: u32,
}

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(600);

fn doc(port: u32) -> String {
    format!("port = {port}\n")
}

fn options(debounce_ms: u64, notify_initial: bool) -> WatchOptions {
    WatchOptions {
        debounce: Duration::from_millis(debounce_ms),
        notify_initial,
    }
}

fn loader() -> Loader {
    Loader::with_registry(Arc::new(RuleRegistry::with_builtins()))
}

/// Drain `rx` until `port` arrives. Repeats of earlier revisions are skipped.
async fn wait_for_port(rx: &mut mpsc::UnboundedReceiver<u32>, port: u32, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match next_within(rx, remaining).await {
            Some(got) if got == port => return true,
            Some(_) => continue,
            None => return false,
        }
    }
}

fn start(
    dir: &TempDir,
    opts: WatchOptions,
) -> (Watcher<AppConfig>, mpsc::UnboundedReceiver<u32>) {
    let path = dir.path().join("app.toml");
    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = Watcher::start(&path, opts, loader(), move |cfg: Arc<AppConfig>| {
        let _ = tx.send(cfg.port);
    })
    .unwrap();
    (watcher, rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_load_and_reload() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "app.toml", &doc(8080));

    let (watcher, mut rx) = start(&dir, options(50, true));
    assert_eq!(watcher.state(), WatcherState::Running);
    assert_eq!(watcher.path(), path.as_path());
    assert_eq!(next_within(&mut rx, WAIT).await, Some(8080));
    assert_eq!(watcher.current().port, 8080);

    write_config(dir.path(), "app.toml", &doc(9090));
    assert_eq!(next_within(&mut rx, WAIT).await, Some(9090));
    assert_eq!(watcher.current().port, 9090);

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rapid_writes_coalesce_into_one_reload() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "app.toml", &doc(1000));

    let (watcher, mut rx) = start(&dir, options(300, false));

    for port in [1001, 1002, 1003] {
        write_config(dir.path(), "app.toml", &doc(port));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(next_within(&mut rx, WAIT).await, Some(1003));
    assert_eq!(next_within(&mut rx, QUIET).await, None);
    assert_eq!(watcher.current().port, 1003);

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_edit_keeps_last_good_config() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "app.toml", &doc(8080));

    let (watcher, mut rx) = start(&dir, options(50, false));
    let before = watcher.current();

    // Fails validation.
    write_config(dir.path(), "app.toml", &doc(0));
    assert_eq!(next_within(&mut rx, QUIET).await, None);
    assert!(Arc::ptr_eq(&before, &watcher.current()));

    // Fails parsing.
    write_config(dir.path(), "app.toml", "port = = 1\n");
    assert_eq!(next_within(&mut rx, QUIET).await, None);
    assert!(Arc::ptr_eq(&before, &watcher.current()));
    assert_eq!(watcher.current().port, 8080);

    // Recovers on the next valid edit.
    write_config(dir.path(), "app.toml", &doc(7070));
    assert_eq!(next_within(&mut rx, WAIT).await, Some(7070));

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_callbacks_after_stop() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "app.toml", &doc(8080));

    let (watcher, mut rx) = start(&dir, options(50, false));
    watcher.stop();
    watcher.stop();
    assert_eq!(watcher.state(), WatcherState::Stopped);
    watcher.shutdown().await;

    write_config(dir.path(), "app.toml", &doc(9090));
    assert_eq!(next_within(&mut rx, QUIET).await, None);
    assert_eq!(watcher.current().port, 8080);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drop_stops_watching() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "app.toml", &doc(8080));

    let (watcher, mut rx) = start(&dir, options(50, false));
    drop(watcher);

    write_config(dir.path(), "app.toml", &doc(9090));
    assert_eq!(next_within(&mut rx, QUIET).await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_other_files_in_directory_are_ignored() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "app.toml", &doc(8080));

    let (watcher, mut rx) = start(&dir, options(50, false));
    write_config(dir.path(), "other.toml", &doc(1));
    assert_eq!(next_within(&mut rx, QUIET).await, None);
    assert_eq!(watcher.current().port, 8080);

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_load_failure_is_returned() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "app.toml", &doc(0));

    let result = Watcher::<AppConfig>::start(&path, options(50, true), loader(), |_| {});
    assert!(matches!(result, Err(ConfigError::Validation(_))));

    let missing = dir.path().join("missing.toml");
    let result = Watcher::<AppConfig>::start(&missing, options(50, true), loader(), |_| {});
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_start_without_runtime_is_invalid_argument() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "app.toml", &doc(8080));

    let result = Watcher::<AppConfig>::start(&path, WatchOptions::default(), loader(), |_| {});
    assert!(matches!(result, Err(ConfigError::InvalidArgument(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "app.toml", &doc(8080));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = ruleconf::watch(&path, move |cfg: Arc<AppConfig>| {
        let _ = tx.send(cfg.port);
    })
    .unwrap();
    assert_eq!(next_within(&mut rx, WAIT).await, Some(8080));

    watcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_callback_does_not_stall_reloads() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "app.toml", &doc(1));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = Watcher::start(&path, options(50, false), loader(), move |cfg: Arc<AppConfig>| {
        let _ = tx.send(cfg.port);
        if cfg.port == 2 {
            std::thread::sleep(Duration::from_secs(3));
        }
    })
    .unwrap();

    write_config(dir.path(), "app.toml", &doc(2));
    assert_eq!(next_within(&mut rx, WAIT).await, Some(2));

    // The callback for 2 is still blocked; the next revision must get through.
    write_config(dir.path(), "app.toml", &doc(3));
    assert!(wait_for_port(&mut rx, 3, Duration::from_millis(1500)).await);
    assert_eq!(watcher.current().port, 3);

    watcher.shutdown().await;
}

/// Counts validations and holds each one for a while.
#[derive(Debug)]
struct Slow {
    calls: Arc<AtomicUsize>,
}

impl Rule for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn validate(&self, _field: &FieldDescriptor<'_>) -> Result<(), Violation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(400));
        Ok(())
    }
}

#[derive(Debug, Deserialize, Record)]
struct SlowConfig {
    #[validate("slow")]
    port: u32,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_change_during_reload_triggers_another_pass() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "app.toml", &doc(1));

    let calls = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(RuleRegistry::with_builtins());
    let counter = calls.clone();
    registry.register("slow", move |_| {
        Ok(Box::new(Slow {
            calls: counter.clone(),
        }))
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = Watcher::start(
        &path,
        options(100, false),
        Loader::with_registry(registry),
        move |cfg: Arc<SlowConfig>| {
            let _ = tx.send(cfg.port);
        },
    )
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    write_config(dir.path(), "app.toml", &doc(2));

    // Wait until the reload of 2 is inside validation, then change the file again.
    let deadline = tokio::time::Instant::now() + WAIT;
    while calls.load(Ordering::SeqCst) < 2 {
        assert!(tokio::time::Instant::now() < deadline, "reload never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    write_config(dir.path(), "app.toml", &doc(3));

    assert!(wait_for_port(&mut rx, 3, WAIT).await);
    assert_eq!(watcher.current().port, 3);
    assert!(calls.load(Ordering::SeqCst) >= 3);

    watcher.shutdown().await;
}
