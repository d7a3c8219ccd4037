//! Configuration file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event ──▶ mpsc ──▶ watch loop ──(debounce)──▶ reload
//!                              ▲                          │
//!                   stop ──────┘          spawn_blocking(Loader::load)
//!                                                         │
//!                           Ok: ArcSwap::store + spawn callback
//!                           Err: log, keep last good config
//! ```
//!
//! # Design Decisions
//! - The parent directory is watched, not the file, so editors that replace
//!   the file by rename keep being observed
//! - Bursts of events re-arm a single debounce timer; one reload per quiet period
//! - Reloads are awaited inside the loop, so they never overlap
//! - Callbacks run on the blocking pool and never stall the loop

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::error::ConfigError;
use crate::loader::Loader;
use crate::record::Inspect;

/// Callback invoked with each accepted configuration.
pub type OnChange<T> = Arc<dyn Fn(Arc<T>) + Send + Sync>;

/// Tuning for a [`Watcher`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Quiet period after the last change event before reloading.
    pub debounce: Duration,
    /// Invoke the callback with the initially loaded config.
    pub notify_initial: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            notify_initial: true,
        }
    }
}

/// Lifecycle of a [`Watcher`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Starting,
    Running,
    Stopped,
}

impl WatcherState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WatcherState::Starting,
            1 => WatcherState::Running,
            _ => WatcherState::Stopped,
        }
    }
}

/// State shared between the handle and the watch loop.
struct Shared<T> {
    path: PathBuf,
    current: ArcSwap<T>,
    state: AtomicU8,
}

impl<T> Shared<T> {
    fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WatcherState) -> WatcherState {
        WatcherState::from_u8(self.state.swap(state as u8, Ordering::AcqRel))
    }
}

/// Keeps a config record in sync with its file.
///
/// Dropping the handle stops the watch loop.
pub struct Watcher<T> {
    shared: Arc<Shared<T>>,
    stop_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Watcher<T>
where
    T: DeserializeOwned + Inspect + Send + Sync + 'static,
{
    /// Load `path`, publish it and start watching for changes.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Any error from the initial load, [`ConfigError::Watch`] if the file
    /// cannot be watched, or [`ConfigError::InvalidArgument`] when no Tokio
    /// runtime is available.
    pub fn start<F>(
        path: impl AsRef<Path>,
        options: WatchOptions,
        loader: Loader,
        on_change: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(Arc<T>) + Send + Sync + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ConfigError::InvalidArgument(format!("config watcher needs a Tokio runtime: {e}"))
        })?;

        let initial = Arc::new(loader.load::<T>(&path)?);

        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                ConfigError::InvalidArgument(format!("{} does not name a file", path.display()))
            })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut fs_watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|source| ConfigError::Watch {
            path: path.clone(),
            source,
        })?;
        fs_watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::Watch {
                path: path.clone(),
                source,
            })?;

        let shared = Arc::new(Shared {
            path: path.clone(),
            current: ArcSwap::new(initial.clone()),
            state: AtomicU8::new(WatcherState::Starting as u8),
        });
        let on_change: OnChange<T> = Arc::new(on_change);

        if options.notify_initial {
            dispatch(&runtime, &on_change, initial);
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let watch_loop = WatchLoop {
            shared: shared.clone(),
            loader,
            on_change,
            file_name,
            debounce: options.debounce,
            events: event_rx,
            stop: stop_rx,
            _fs_watcher: fs_watcher,
        };

        shared.set_state(WatcherState::Running);
        let task = runtime.spawn(watch_loop.run());

        tracing::info!(
            path = %path.display(),
            debounce_ms = options.debounce.as_millis() as u64,
            "Config watcher started"
        );

        Ok(Self {
            shared,
            stop_tx,
            task: Mutex::new(Some(task)),
        })
    }
}

impl<T> Watcher<T> {
    /// The most recently accepted configuration.
    pub fn current(&self) -> Arc<T> {
        self.shared.current.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn state(&self) -> WatcherState {
        self.shared.state()
    }

    /// Stop watching. Idempotent.
    ///
    /// A reload already reading the file may finish, but it will neither
    /// publish nor call back.
    pub fn stop(&self) {
        if self.shared.set_state(WatcherState::Stopped) != WatcherState::Stopped {
            let _ = self.stop_tx.send(());
            tracing::info!(path = %self.shared.path.display(), "Config watcher stopping");
        }
    }

    /// Stop watching and wait for the watch loop to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Config watch loop panicked");
            }
        }
    }
}

impl<T> Drop for Watcher<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T> fmt::Debug for Watcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("path", &self.shared.path)
            .field("state", &self.state())
            .finish()
    }
}

/// Watch `path` with default options and the default [`Loader`].
pub fn watch<T, F>(path: impl AsRef<Path>, on_change: F) -> Result<Watcher<T>, ConfigError>
where
    T: DeserializeOwned + Inspect + Send + Sync + 'static,
    F: Fn(Arc<T>) + Send + Sync + 'static,
{
    Watcher::start(path, WatchOptions::default(), Loader::new(), on_change)
}

/// Background task owned by one [`Watcher`].
struct WatchLoop<T> {
    shared: Arc<Shared<T>>,
    loader: Loader,
    on_change: OnChange<T>,
    file_name: OsString,
    debounce: Duration,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    stop: broadcast::Receiver<()>,
    /// Dropped with the loop, which unregisters the watch.
    _fs_watcher: RecommendedWatcher,
}

impl<T> WatchLoop<T>
where
    T: DeserializeOwned + Inspect + Send + Sync + 'static,
{
    async fn run(mut self) {
        let timer = time::sleep(self.debounce);
        tokio::pin!(timer);
        let mut armed = false;

        loop {
            tokio::select! {
                biased;

                _ = self.stop.recv() => break,

                Some(res) = self.events.recv() => match res {
                    Ok(event) if self.is_relevant(&event) => {
                        tracing::debug!(kind = ?event.kind, "Config change detected");
                        timer.as_mut().reset(Instant::now() + self.debounce);
                        armed = true;
                    }
                    Ok(event) => {
                        tracing::trace!(kind = ?event.kind, paths = ?event.paths, "Ignoring fs event");
                    }
                    Err(e) => tracing::warn!(error = %e, "Config watch error"),
                },

                _ = &mut timer, if armed => {
                    armed = false;
                    self.reload().await;
                }
            }

            if self.shared.state() == WatcherState::Stopped {
                break;
            }
        }

        tracing::info!(path = %self.shared.path.display(), "Config watcher stopped");
    }

    /// Create or content/name change of the watched file.
    fn is_relevant(&self, event: &Event) -> bool {
        let kind_matches = match event.kind {
            EventKind::Create(_) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        };
        kind_matches
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }

    async fn reload(&self) {
        let loader = self.loader.clone();
        let path = self.shared.path.clone();
        let result = tokio::task::spawn_blocking(move || loader.load::<T>(&path)).await;

        match result {
            Ok(Ok(config)) => {
                if self.shared.state() == WatcherState::Stopped {
                    tracing::debug!("Discarding reload finished after stop");
                    return;
                }
                let config = Arc::new(config);
                self.shared.current.store(config.clone());
                tracing::info!(path = %self.shared.path.display(), "Config reloaded");
                dispatch(&tokio::runtime::Handle::current(), &self.on_change, config);
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    path = %self.shared.path.display(),
                    error = %e,
                    "Failed to reload config. Keeping current configuration."
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Config reload task failed");
            }
        }
    }
}

/// Fire-and-forget callback on the blocking pool.
fn dispatch<T>(runtime: &tokio::runtime::Handle, on_change: &OnChange<T>, config: Arc<T>)
where
    T: Send + Sync + 'static,
{
    let on_change = on_change.clone();
    runtime.spawn_blocking(move || on_change(config));
}
