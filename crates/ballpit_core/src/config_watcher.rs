//! Hot reload of the scene config file.
//!
//! The parent directory is watched rather than the file itself, since most
//! editors save by writing a temp file and renaming it over the existing one.
//! Every frame the pending events are drained; if any touched the config
//! file it is reloaded once and sent to every live scene as
//! [`SceneAction::Reconfigure`]. A config that fails to load is logged and
//! the scenes keep running with what they have.

use bevy::prelude::*;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};

use crate::config::{load_config, BallpitConfig};
use crate::scene::{BallpitScene, SceneAction, SceneCommand};

/// Error from setting up the watcher.
#[derive(Debug)]
pub enum WatchError {
    /// Path has no file name component
    InvalidPath(PathBuf),
    /// Failed to create the watcher
    WatcherCreation(notify::Error),
    /// Failed to watch the directory
    WatchDirectory(notify::Error),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::InvalidPath(p) => write!(f, "Not a file path: {}", p.display()),
            WatchError::WatcherCreation(e) => write!(f, "Failed to create watcher: {}", e),
            WatchError::WatchDirectory(e) => write!(f, "Failed to watch directory: {}", e),
        }
    }
}

impl std::error::Error for WatchError {}

pub type WatchResult<T> = Result<T, WatchError>;

/// Watches one config file (non-send due to mpsc Receiver).
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<Result<Event, notify::Error>>,
    path: PathBuf,
    file_name: OsString,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> WatchResult<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| WatchError::InvalidPath(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = channel();
        let mut watcher = recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(WatchError::WatcherCreation)?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(WatchError::WatchDirectory)?;

        info!("Watching {} for changes", path.display());

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path: path.to_path_buf(),
            file_name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending events. True if any of them touched the config file.
    pub fn poll(&self) -> bool {
        let mut changed = false;
        loop {
            match self.receiver.try_recv() {
                Ok(Ok(event)) => changed |= event_touches(&event, &self.file_name),
                Ok(Err(e)) => error!("Config watcher error: {:?}", e),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    error!("Config watcher channel disconnected");
                    break;
                }
            }
        }
        changed
    }
}

fn event_touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Load `path`, logging and swallowing any error.
pub fn reload_config(path: &Path) -> Option<BallpitConfig> {
    match load_config(path) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Ignoring invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Installs a [`ConfigWatcher`] for `path` and forwards reloads to scenes.
pub struct ConfigWatchPlugin {
    pub path: PathBuf,
}

impl Plugin for ConfigWatchPlugin {
    fn build(&self, app: &mut App) {
        match ConfigWatcher::new(&self.path) {
            Ok(watcher) => {
                app.insert_non_send_resource(watcher)
                    .add_systems(Update, forward_config_changes);
            }
            Err(e) => error!("Config hot reload disabled: {}", e),
        }
    }
}

fn forward_config_changes(
    watcher: Option<NonSend<ConfigWatcher>>,
    scenes: Query<(Entity, &BallpitScene)>,
    mut writer: MessageWriter<SceneCommand>,
) {
    let Some(watcher) = watcher else { return };
    if !watcher.poll() {
        return;
    }
    let Some(config) = reload_config(watcher.path()) else {
        return;
    };

    let mut sent = 0;
    for (entity, scene) in scenes.iter().filter(|(_, s)| !s.is_disposed()) {
        writer.write(SceneCommand {
            scene: entity,
            action: SceneAction::Reconfigure(Box::new(config.clone())),
        });
        sent += 1;
    }
    info!("Reloaded {} for {} scene(s)", watcher.path().display(), sent);
}
